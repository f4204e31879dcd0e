//! Segments Core - Entity Types
//!
//! Pure data structures shared by the storage and propagation crates:
//! typed ids, page/experience entities, the component instance id codec,
//! error types and configuration.

mod component;
mod config;
mod entities;
mod error;
mod identity;

pub use component::ComponentInstanceId;
pub use config::{DraftPolicy, LogConfig, PropagationConfig};
pub use entities::{
    ComponentLink, EntityRef, EntityType, Experience, Experiment, ExperimentRel, NewExperience,
    PreferencesEntry,
};
pub use error::{ConfigError, SegmentsError, SegmentsResult, StorageError, ValidationError};
pub use identity::{
    ComponentLinkId, EntityIdType, EntryId, ExperienceId, ExperimentId, ExperimentRelId, GroupId,
    PlId, Timestamp,
};
