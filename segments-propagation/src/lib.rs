//! Segments Propagation - Experience Content Propagation
//!
//! When a page gains a new experience, the content of its base experience
//! is copied to it: structure data, the editable values of every component
//! and component preferences. `create_experience_with_content` runs the
//! whole sequence under one transaction scope and `handle_add_experience`
//! wraps it as a request action.

pub mod action;
pub mod editable;
pub mod orchestration;
pub mod propagator;
pub mod telemetry;

pub use action::{handle_add_experience, ActionResponse};
pub use editable::{EditableValuesDocument, ProcessorShape};
pub use orchestration::{
    create_experience_with_content, AddExperienceRequest, ExperienceCreation, ExperienceSummary,
    ExperimentRelSummary,
};
pub use propagator::{ExperienceContentPropagator, PreferencesReport};
pub use telemetry::init_tracing;
