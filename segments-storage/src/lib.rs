//! Segments Storage - Collaborator Traits and Mock Implementation
//!
//! Defines the store abstractions the experience propagator works against.
//! The portal's persistence layer implements them; `MockStorage` is an
//! in-memory implementation with snapshot transactions for tests.

pub mod mock;
pub mod transaction;

pub use mock::MockStorage;
pub use transaction::{in_transaction, TransactionManager, TxScope};

use segments_core::{
    ComponentInstanceId, ComponentLink, ComponentLinkId, EntityRef, Experience, ExperienceId,
    Experiment, ExperimentId, ExperimentRel, GroupId, NewExperience, PlId, PreferencesEntry,
    SegmentsResult,
};
use std::collections::BTreeMap;

// ============================================================================
// STRUCTURE STORE
// ============================================================================

/// Serialized layout structure of a page, one document per experience.
pub trait StructureStore: Send + Sync {
    /// Get the structure data of `experience`.
    ///
    /// With `create_if_absent` a missing structure record is created for a
    /// known entity. Unknown entities fail with `StorageError::NotFound`.
    /// A variant without data yields an empty string.
    fn structure_fetch(
        &self,
        group_id: GroupId,
        entity: EntityRef,
        experience: ExperienceId,
        create_if_absent: bool,
    ) -> SegmentsResult<String>;

    /// Insert or replace the structure data of `experience`.
    fn structure_upsert(
        &self,
        group_id: GroupId,
        entity: EntityRef,
        experience: ExperienceId,
        data: &str,
    ) -> SegmentsResult<()>;
}

// ============================================================================
// COMPONENT LINK STORE
// ============================================================================

/// Content components attached to pages.
pub trait ComponentLinkStore: Send + Sync {
    /// List the components attached to a page.
    fn component_links_list(
        &self,
        group_id: GroupId,
        entity: EntityRef,
    ) -> SegmentsResult<Vec<ComponentLink>>;

    /// Replace the editable values of several components in one call.
    fn component_links_update_editable_values(
        &self,
        editable_values: &BTreeMap<ComponentLinkId, String>,
    ) -> SegmentsResult<()>;
}

// ============================================================================
// PREFERENCES STORE
// ============================================================================

/// Per component instance configuration, owned by a page.
pub trait PreferencesStore: Send + Sync {
    /// List every preferences entry owned by a page.
    fn preferences_list(&self, owner: PlId) -> SegmentsResult<Vec<PreferencesEntry>>;

    /// Get one entry.
    fn preferences_fetch(
        &self,
        owner: PlId,
        component_instance_id: &ComponentInstanceId,
    ) -> SegmentsResult<Option<PreferencesEntry>>;

    /// Insert a new entry. Fails if one already exists.
    fn preferences_create(&self, entry: &PreferencesEntry) -> SegmentsResult<()>;

    /// Replace the blob of an existing entry.
    fn preferences_update(&self, entry: &PreferencesEntry) -> SegmentsResult<()>;
}

/// Lookup of components currently deployed in the portal.
pub trait ComponentRegistry: Send + Sync {
    fn is_registered(&self, component_name: &str) -> bool;
}

// ============================================================================
// EXPERIENCE STORE
// ============================================================================

/// Experience, experiment and page lookups owned by the hosting portal.
pub trait ExperienceStore: Send + Sync {
    /// Get an experience by ID.
    fn experience_get(&self, id: ExperienceId) -> SegmentsResult<Option<Experience>>;

    /// Create an experience; the store assigns id and priority.
    fn experience_create(&self, new: &NewExperience) -> SegmentsResult<Experience>;

    /// Get an experiment by ID.
    fn experiment_get(&self, id: ExperimentId) -> SegmentsResult<Option<Experiment>>;

    /// Attach an experience to an experiment as a new variant.
    fn experiment_rel_create(
        &self,
        experiment_id: ExperimentId,
        experience_id: ExperienceId,
    ) -> SegmentsResult<ExperimentRel>;

    /// Draft page of a published page, if one exists.
    fn draft_fetch(&self, entity: EntityRef) -> SegmentsResult<Option<EntityRef>>;
}

/// Every collaborator the orchestration needs, as one bound.
pub trait SegmentsStores:
    StructureStore + ComponentLinkStore + PreferencesStore + ComponentRegistry + ExperienceStore
{
}

impl<T> SegmentsStores for T where
    T: StructureStore + ComponentLinkStore + PreferencesStore + ComponentRegistry + ExperienceStore
{
}
