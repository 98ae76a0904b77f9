//! Model capability registry, prompt requirement analysis, and
//! capability/budget-aware model routing.

pub mod registry;
pub mod requirements;
pub mod router;

pub use registry::{CapabilityRegistry, ModelDescriptor};
pub use requirements::{Classifier, PromptRequirements, RequirementAnalyzer};
pub use router::{ScoredModel, select_model};
