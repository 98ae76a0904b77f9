//! Capability and budget aware model routing
//!
//! Scores every router-eligible model against a requirement profile
//! and picks the highest scorer. Ties resolve by registry declaration
//! order (first seen wins); a zero top score falls back to the
//! configured default model.

use tracing::warn;

use crate::registry::{CapabilityRegistry, ModelDescriptor};
use crate::requirements::PromptRequirements;

/// A candidate model with its computed routing score
#[derive(Debug, Clone)]
pub struct ScoredModel {
    /// Internal model identifier
    pub id: String,
    /// Weighted routing score; 0 means gated out
    pub score: f64,
    /// Why the model was gated out, when it was
    pub reason: Option<String>,
}

/// Select the best model for a requirement profile
///
/// Only router-eligible models are considered. When every candidate
/// scores zero the configured default model id is returned and a
/// warning is logged.
pub fn select_model(registry: &CapabilityRegistry, requirements: &PromptRequirements) -> String {
    let mut best: Option<ScoredModel> = None;

    for model in registry.router_eligible() {
        let scored = score_model(model, requirements);
        // Strictly-greater comparison keeps the first seen on ties
        if best.as_ref().is_none_or(|b| scored.score > b.score) {
            best = Some(scored);
        }
    }

    match best {
        Some(top) if top.score > 0.0 => top.id,
        _ => {
            warn!(
                default = %registry.default_model().id,
                "no model scored above zero, falling back to default"
            );
            registry.default_model().id.clone()
        }
    }
}

/// Score one candidate against the requirement profile
///
/// Gates (each yields a hard zero):
/// - an empty `required_capabilities` set
/// - any required capability missing from the model's strengths
/// - an estimated cost above the budget constraint
///
/// Otherwise the score is a weighted sum of complexity fit, budget
/// headroom, reliability, speed, and multimodal/function bonuses.
/// Models without reliability/speed observations stop after the
/// complexity and budget terms.
pub fn score_model(model: &ModelDescriptor, requirements: &PromptRequirements) -> ScoredModel {
    let gated = |reason: &str| ScoredModel {
        id: model.id.clone(),
        score: 0.0,
        reason: Some(reason.to_owned()),
    };

    if requirements.required_capabilities.is_empty() {
        return gated("no required capabilities");
    }

    if !requirements
        .required_capabilities
        .iter()
        .all(|tag| model.strengths.contains(tag))
    {
        return gated("missing required capability");
    }

    let estimated_cost = model.estimate_cost(
        requirements.estimated_input_tokens,
        requirements.estimated_output_tokens,
    );
    if let Some(budget) = requirements.budget_constraint
        && estimated_cost > budget
    {
        return gated("estimated cost exceeds budget");
    }

    let complexity_gap =
        (f64::from(requirements.expected_complexity) - f64::from(model.context_complexity)).abs();
    let complexity_score = (5.0 - complexity_gap).max(0.0) * 2.0;

    let budget_score = requirements
        .budget_constraint
        .map_or(0.0, |budget| (1.0 - estimated_cost / budget) * 3.0);

    let mut score = complexity_score + budget_score;

    if let (Some(reliability), Some(speed)) = (model.reliability, model.speed) {
        score += f64::from(reliability);
        score += 6.0 - f64::from(speed);

        if requirements.has_images && model.multimodal {
            score += 5.0;
        }
        if requirements.needs_functions && model.supports_functions {
            score += 5.0;
        }
    }

    ScoredModel {
        id: model.id.clone(),
        score,
        reason: None,
    }
}
