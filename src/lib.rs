pub mod config;
pub mod errors;
pub mod fixtures;

// Pipeline steps and their system-tool implementations
#[path = "building/mod.rs"]
pub mod building;

pub use crate::building::generator::{generate, Collaborators, GenerateSummary, SystemTools};
pub use crate::building::verify::{verify_image, verify_tree, Mismatch, VerifyReport};
pub use crate::config::GeneratorConfig;
pub use crate::errors::{FixtureError, StepFailure};
