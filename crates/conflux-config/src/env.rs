use std::sync::OnceLock;

use regex::Regex;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("must be valid regex"))
}

/// Expand `{{ env.VAR }}` placeholders in a raw TOML string
///
/// Expansion runs on the raw text before deserialization so config
/// structs can stay plain String/SecretString. Comment lines are passed
/// through unchanged.
pub fn expand_env(input: &str) -> Result<String, String> {
    let mut output = String::with_capacity(input.len());

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n');
        }

        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut expanded = String::with_capacity(line.len());
        let mut last_end = 0;
        for captures in placeholder_re().captures_iter(line) {
            let overall = captures.get(0).expect("regex matched");
            let var_name = &captures[1];

            expanded.push_str(&line[last_end..overall.start()]);
            match std::env::var(var_name) {
                Ok(value) => expanded.push_str(&value),
                Err(_) => return Err(format!("environment variable not found: `{var_name}`")),
            }
            last_end = overall.end();
        }
        expanded.push_str(&line[last_end..]);
        output.push_str(&expanded);
    }

    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}
