//! In-memory mock storage for testing.

use crate::transaction::rollback_only_error;
use crate::{
    ComponentLinkStore, ComponentRegistry, ExperienceStore, PreferencesStore, StructureStore,
    TransactionManager, TxScope,
};
use segments_core::{
    ComponentInstanceId, ComponentLink, ComponentLinkId, EntityIdType, EntityRef, EntityType,
    Experience, ExperienceId, Experiment, ExperimentId, ExperimentRel, ExperimentRelId, GroupId,
    NewExperience, PlId, PreferencesEntry, SegmentsError, SegmentsResult, StorageError,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

type StructureKey = (GroupId, EntityRef);
type PreferencesKey = (PlId, ComponentInstanceId);

#[derive(Debug, Clone, Default)]
struct StoreState {
    pages: BTreeSet<EntityRef>,
    drafts: HashMap<EntityRef, EntityRef>,
    structures: HashMap<StructureKey, BTreeMap<ExperienceId, String>>,
    component_links: BTreeMap<ComponentLinkId, ComponentLink>,
    preferences: BTreeMap<PreferencesKey, PreferencesEntry>,
    experiences: BTreeMap<ExperienceId, Experience>,
    experiments: BTreeMap<ExperimentId, Experiment>,
    experiment_rels: BTreeMap<ExperimentRelId, ExperimentRel>,
    registered_components: HashSet<String>,
    last_id: i64,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Debug, Default)]
struct TxState {
    depth: usize,
    last_tx_id: u64,
    current_tx_id: u64,
    snapshot: Option<StoreState>,
    rollback_only: bool,
}

/// In-memory implementation of every store trait.
///
/// Transactions snapshot the whole state on `begin` and restore it on
/// rollback, which lets tests observe all-or-nothing behaviour.
#[derive(Debug, Default)]
pub struct MockStorage {
    state: RwLock<StoreState>,
    tx: Mutex<TxState>,
    fail_component_link_updates: AtomicBool,
}

impl MockStorage {
    /// Create a new mock storage.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> SegmentsResult<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| SegmentsError::Storage(StorageError::LockPoisoned))
    }

    fn write(&self) -> SegmentsResult<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| SegmentsError::Storage(StorageError::LockPoisoned))
    }

    fn tx_state(&self) -> SegmentsResult<MutexGuard<'_, TxState>> {
        self.tx
            .lock()
            .map_err(|_| SegmentsError::Storage(StorageError::LockPoisoned))
    }

    // === Seeding ===

    /// Register a page so structures can be created for it.
    pub fn add_page(&self, entity: EntityRef) -> SegmentsResult<()> {
        self.write()?.pages.insert(entity);
        Ok(())
    }

    /// Register `draft` as the draft page of `published`.
    pub fn add_draft(&self, published: EntityRef, draft: EntityRef) -> SegmentsResult<()> {
        let mut state = self.write()?;
        state.pages.insert(draft);
        state.drafts.insert(published, draft);
        Ok(())
    }

    /// Attach a component to a page and return its id.
    pub fn add_component_link(
        &self,
        group_id: GroupId,
        entity: EntityRef,
        editable_values: &str,
    ) -> SegmentsResult<ComponentLinkId> {
        let mut state = self.write()?;
        let component_link_id = ComponentLinkId::new(state.next_id());
        state.component_links.insert(
            component_link_id,
            ComponentLink {
                component_link_id,
                group_id,
                entity,
                editable_values: editable_values.to_string(),
            },
        );
        Ok(component_link_id)
    }

    /// Mark a component as deployed.
    pub fn register_component(&self, component_name: &str) -> SegmentsResult<()> {
        self.write()?
            .registered_components
            .insert(component_name.to_string());
        Ok(())
    }

    /// Mark a component as undeployed.
    pub fn unregister_component(&self, component_name: &str) -> SegmentsResult<()> {
        self.write()?.registered_components.remove(component_name);
        Ok(())
    }

    /// Create an experiment running on `experience_id`.
    pub fn add_experiment(
        &self,
        entity: EntityRef,
        experience_id: ExperienceId,
        name: &str,
    ) -> SegmentsResult<Experiment> {
        let mut state = self.write()?;
        let experiment = Experiment {
            experiment_id: ExperimentId::new(state.next_id()),
            entity,
            experience_id,
            name: name.to_string(),
        };
        state
            .experiments
            .insert(experiment.experiment_id, experiment.clone());
        Ok(experiment)
    }

    /// Make the next batch update of editable values fail.
    pub fn fail_next_component_link_update(&self) {
        self.fail_component_link_updates
            .store(true, Ordering::SeqCst);
    }

    // === Inspection ===

    /// Get a component link by ID.
    pub fn component_link_get(&self, id: ComponentLinkId) -> SegmentsResult<Option<ComponentLink>> {
        Ok(self.read()?.component_links.get(&id).cloned())
    }

    /// Get the count of stored experiences.
    pub fn experience_count(&self) -> SegmentsResult<usize> {
        Ok(self.read()?.experiences.len())
    }

    /// Get the count of stored experiment relations.
    pub fn experiment_rel_count(&self) -> SegmentsResult<usize> {
        Ok(self.read()?.experiment_rels.len())
    }

    /// Get the count of stored preferences entries.
    pub fn preferences_count(&self) -> SegmentsResult<usize> {
        Ok(self.read()?.preferences.len())
    }

    /// True while a transaction is open.
    pub fn in_transaction(&self) -> SegmentsResult<bool> {
        Ok(self.tx_state()?.depth > 0)
    }
}

fn structure_not_found(entity: EntityRef) -> SegmentsError {
    SegmentsError::not_found(entity.entity_type, entity.id)
}

impl StructureStore for MockStorage {
    fn structure_fetch(
        &self,
        group_id: GroupId,
        entity: EntityRef,
        experience: ExperienceId,
        create_if_absent: bool,
    ) -> SegmentsResult<String> {
        let mut state = self.write()?;
        let key = (group_id, entity);

        if !state.structures.contains_key(&key) {
            if !create_if_absent {
                return Err(SegmentsError::not_found(EntityType::Structure, entity));
            }
            if !state.pages.contains(&entity) {
                return Err(structure_not_found(entity));
            }
            tracing::debug!(%group_id, %entity, "Creating structure record");
            state.structures.insert(key, BTreeMap::new());
        }

        Ok(state
            .structures
            .get(&key)
            .and_then(|variants| variants.get(&experience))
            .cloned()
            .unwrap_or_default())
    }

    fn structure_upsert(
        &self,
        group_id: GroupId,
        entity: EntityRef,
        experience: ExperienceId,
        data: &str,
    ) -> SegmentsResult<()> {
        let mut state = self.write()?;
        if !state.pages.contains(&entity) {
            return Err(structure_not_found(entity));
        }
        state
            .structures
            .entry((group_id, entity))
            .or_default()
            .insert(experience, data.to_string());
        Ok(())
    }
}

impl ComponentLinkStore for MockStorage {
    fn component_links_list(
        &self,
        group_id: GroupId,
        entity: EntityRef,
    ) -> SegmentsResult<Vec<ComponentLink>> {
        let state = self.read()?;
        Ok(state
            .component_links
            .values()
            .filter(|link| link.group_id == group_id && link.entity == entity)
            .cloned()
            .collect())
    }

    fn component_links_update_editable_values(
        &self,
        editable_values: &BTreeMap<ComponentLinkId, String>,
    ) -> SegmentsResult<()> {
        if self.fail_component_link_updates.swap(false, Ordering::SeqCst) {
            return Err(SegmentsError::Storage(StorageError::UpdateFailed {
                entity_type: EntityType::ComponentLink,
                id: editable_values
                    .keys()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
                reason: "injected failure".to_string(),
            }));
        }

        let mut state = self.write()?;
        // Validate the whole batch before applying any of it
        if let Some(missing) = editable_values
            .keys()
            .find(|id| !state.component_links.contains_key(id))
        {
            return Err(SegmentsError::not_found(EntityType::ComponentLink, missing));
        }

        for (id, values) in editable_values {
            if let Some(link) = state.component_links.get_mut(id) {
                link.editable_values = values.clone();
            }
        }
        Ok(())
    }
}

impl PreferencesStore for MockStorage {
    fn preferences_list(&self, owner: PlId) -> SegmentsResult<Vec<PreferencesEntry>> {
        let state = self.read()?;
        Ok(state
            .preferences
            .values()
            .filter(|entry| entry.owner == owner)
            .cloned()
            .collect())
    }

    fn preferences_fetch(
        &self,
        owner: PlId,
        component_instance_id: &ComponentInstanceId,
    ) -> SegmentsResult<Option<PreferencesEntry>> {
        let state = self.read()?;
        Ok(state
            .preferences
            .get(&(owner, component_instance_id.clone()))
            .cloned())
    }

    fn preferences_create(&self, entry: &PreferencesEntry) -> SegmentsResult<()> {
        let mut state = self.write()?;
        let key = (entry.owner, entry.component_instance_id.clone());
        if state.preferences.contains_key(&key) {
            return Err(SegmentsError::Storage(StorageError::InsertFailed {
                entity_type: EntityType::Preferences,
                reason: format!("{} already exists", entry.component_instance_id),
            }));
        }
        state.preferences.insert(key, entry.clone());
        Ok(())
    }

    fn preferences_update(&self, entry: &PreferencesEntry) -> SegmentsResult<()> {
        let mut state = self.write()?;
        let existing = state
            .preferences
            .get_mut(&(entry.owner, entry.component_instance_id.clone()))
            .ok_or_else(|| {
                SegmentsError::not_found(EntityType::Preferences, &entry.component_instance_id)
            })?;
        existing.preferences = entry.preferences.clone();
        Ok(())
    }
}

impl ComponentRegistry for MockStorage {
    fn is_registered(&self, component_name: &str) -> bool {
        self.read()
            .map(|state| state.registered_components.contains(component_name))
            .unwrap_or(false)
    }
}

impl ExperienceStore for MockStorage {
    fn experience_get(&self, id: ExperienceId) -> SegmentsResult<Option<Experience>> {
        Ok(self.read()?.experiences.get(&id).cloned())
    }

    fn experience_create(&self, new: &NewExperience) -> SegmentsResult<Experience> {
        let mut state = self.write()?;
        if !state.pages.contains(&new.entity) {
            return Err(SegmentsError::not_found(new.entity.entity_type, new.entity.id));
        }

        let priority = state
            .experiences
            .values()
            .filter(|e| e.entity == new.entity)
            .map(|e| e.priority)
            .max()
            .unwrap_or(0)
            + 1;

        let experience = Experience {
            experience_id: ExperienceId::new(state.next_id()),
            group_id: new.group_id,
            entity: new.entity,
            entry_id: new.entry_id,
            name: new.name.clone(),
            active: new.active,
            priority,
            created_at: chrono::Utc::now(),
        };
        state
            .experiences
            .insert(experience.experience_id, experience.clone());
        Ok(experience)
    }

    fn experiment_get(&self, id: ExperimentId) -> SegmentsResult<Option<Experiment>> {
        Ok(self.read()?.experiments.get(&id).cloned())
    }

    fn experiment_rel_create(
        &self,
        experiment_id: ExperimentId,
        experience_id: ExperienceId,
    ) -> SegmentsResult<ExperimentRel> {
        let mut state = self.write()?;
        if !state.experiments.contains_key(&experiment_id) {
            return Err(SegmentsError::not_found(EntityType::Experiment, experiment_id));
        }
        let name = match state.experiences.get(&experience_id) {
            Some(experience) => experience.name.values().next().cloned().unwrap_or_default(),
            None if experience_id.is_default() => "Default".to_string(),
            None => return Err(SegmentsError::not_found(EntityType::Experience, experience_id)),
        };

        let rel = ExperimentRel {
            experiment_rel_id: ExperimentRelId::new(state.next_id()),
            experiment_id,
            experience_id,
            name,
            split: 0.0,
        };
        state.experiment_rels.insert(rel.experiment_rel_id, rel.clone());
        Ok(rel)
    }

    fn draft_fetch(&self, entity: EntityRef) -> SegmentsResult<Option<EntityRef>> {
        Ok(self.read()?.drafts.get(&entity).copied())
    }
}

impl TransactionManager for MockStorage {
    fn begin(&self) -> SegmentsResult<TxScope> {
        let mut tx = self.tx_state()?;
        if tx.depth > 0 {
            tx.depth += 1;
            return Ok(TxScope::new(tx.current_tx_id, false));
        }

        let snapshot = self.read()?.clone();
        tx.last_tx_id += 1;
        tx.current_tx_id = tx.last_tx_id;
        tx.depth = 1;
        tx.snapshot = Some(snapshot);
        tx.rollback_only = false;
        tracing::debug!(tx_id = tx.current_tx_id, "Transaction started");
        Ok(TxScope::new(tx.current_tx_id, true))
    }

    fn commit(&self, scope: TxScope) -> SegmentsResult<()> {
        let mut tx = self.tx_state()?;
        check_scope(&tx, &scope)?;
        tx.depth -= 1;
        if !scope.is_owner() {
            return Ok(());
        }

        let snapshot = tx.snapshot.take();
        if tx.rollback_only {
            if let Some(snapshot) = snapshot {
                *self.write()? = snapshot;
            }
            return Err(rollback_only_error(scope.id()));
        }
        tracing::debug!(tx_id = scope.id(), "Transaction committed");
        Ok(())
    }

    fn rollback(&self, scope: TxScope) -> SegmentsResult<()> {
        let mut tx = self.tx_state()?;
        check_scope(&tx, &scope)?;
        tx.depth -= 1;
        if !scope.is_owner() {
            tx.rollback_only = true;
            return Ok(());
        }

        if let Some(snapshot) = tx.snapshot.take() {
            *self.write()? = snapshot;
        }
        tracing::debug!(tx_id = scope.id(), "Transaction rolled back");
        Ok(())
    }
}

fn check_scope(tx: &TxState, scope: &TxScope) -> SegmentsResult<()> {
    if tx.depth == 0 || tx.current_tx_id != scope.id() {
        return Err(SegmentsError::Storage(StorageError::TransactionFailed {
            reason: format!("transaction {} is not open", scope.id()),
        }));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_transaction;
    use segments_core::{EntryId, ValidationError};

    fn page() -> EntityRef {
        EntityRef::layout(PlId::new(1001))
    }

    fn group() -> GroupId {
        GroupId::new(20)
    }

    fn make_new_experience(storage_entity: EntityRef) -> NewExperience {
        let mut name = BTreeMap::new();
        name.insert("en_US".to_string(), "Variant".to_string());
        NewExperience {
            group_id: group(),
            entity: storage_entity,
            entry_id: EntryId::DEFAULT,
            name,
            active: true,
        }
    }

    // ========================================================================
    // Structure Tests
    // ========================================================================

    #[test]
    fn test_structure_lazy_creation() {
        let storage = MockStorage::new();
        storage.add_page(page()).unwrap();

        let data = storage
            .structure_fetch(group(), page(), ExperienceId::DEFAULT, true)
            .unwrap();
        assert_eq!(data, "");

        // The record now exists, so a non-creating fetch succeeds
        assert!(storage
            .structure_fetch(group(), page(), ExperienceId::DEFAULT, false)
            .is_ok());
    }

    #[test]
    fn test_structure_fetch_unknown_page() {
        let storage = MockStorage::new();
        let err = storage
            .structure_fetch(group(), page(), ExperienceId::DEFAULT, true)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_structure_upsert_then_fetch() {
        let storage = MockStorage::new();
        storage.add_page(page()).unwrap();
        storage
            .structure_upsert(group(), page(), ExperienceId::new(3), r#"{"items":{}}"#)
            .unwrap();

        let data = storage
            .structure_fetch(group(), page(), ExperienceId::new(3), false)
            .unwrap();
        assert_eq!(data, r#"{"items":{}}"#);
    }

    // ========================================================================
    // Component Link Tests
    // ========================================================================

    #[test]
    fn test_component_links_batch_update() {
        let storage = MockStorage::new();
        let a = storage.add_component_link(group(), page(), "{}").unwrap();
        let b = storage.add_component_link(group(), page(), "{}").unwrap();
        storage
            .add_component_link(group(), EntityRef::layout(PlId::new(2)), "{}")
            .unwrap();

        assert_eq!(storage.component_links_list(group(), page()).unwrap().len(), 2);

        let mut batch = BTreeMap::new();
        batch.insert(a, r#"{"a":1}"#.to_string());
        batch.insert(b, r#"{"b":2}"#.to_string());
        storage.component_links_update_editable_values(&batch).unwrap();

        let link = storage.component_link_get(a).unwrap().unwrap();
        assert_eq!(link.editable_values, r#"{"a":1}"#);
    }

    #[test]
    fn test_component_links_batch_update_is_all_or_nothing() {
        let storage = MockStorage::new();
        let a = storage.add_component_link(group(), page(), "{}").unwrap();

        let mut batch = BTreeMap::new();
        batch.insert(a, r#"{"a":1}"#.to_string());
        batch.insert(ComponentLinkId::new(999), "{}".to_string());

        let err = storage.component_links_update_editable_values(&batch).unwrap_err();
        assert!(err.is_not_found());
        let link = storage.component_link_get(a).unwrap().unwrap();
        assert_eq!(link.editable_values, "{}");
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let storage = MockStorage::new();
        let a = storage.add_component_link(group(), page(), "{}").unwrap();
        let mut batch = BTreeMap::new();
        batch.insert(a, "{}".to_string());

        storage.fail_next_component_link_update();
        assert!(storage.component_links_update_editable_values(&batch).is_err());
        assert!(storage.component_links_update_editable_values(&batch).is_ok());
    }

    // ========================================================================
    // Preferences Tests
    // ========================================================================

    #[test]
    fn test_preferences_create_update() {
        let storage = MockStorage::new();
        let mut entry = PreferencesEntry {
            owner: PlId::new(1001),
            component_instance_id: ComponentInstanceId::new("banner_INSTANCE_a1"),
            preferences: "<prefs/>".to_string(),
        };

        storage.preferences_create(&entry).unwrap();
        assert!(storage.preferences_create(&entry).is_err());

        entry.preferences = "<prefs><x/></prefs>".to_string();
        storage.preferences_update(&entry).unwrap();

        let stored = storage
            .preferences_fetch(entry.owner, &entry.component_instance_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.preferences, "<prefs><x/></prefs>");
        assert_eq!(storage.preferences_list(PlId::new(1001)).unwrap().len(), 1);
        assert!(storage.preferences_list(PlId::new(1)).unwrap().is_empty());
    }

    #[test]
    fn test_preferences_update_missing() {
        let storage = MockStorage::new();
        let entry = PreferencesEntry {
            owner: PlId::new(1001),
            component_instance_id: ComponentInstanceId::new("banner"),
            preferences: String::new(),
        };
        assert!(storage.preferences_update(&entry).unwrap_err().is_not_found());
    }

    #[test]
    fn test_registry() {
        let storage = MockStorage::new();
        assert!(!storage.is_registered("banner"));
        storage.register_component("banner").unwrap();
        assert!(storage.is_registered("banner"));
        storage.unregister_component("banner").unwrap();
        assert!(!storage.is_registered("banner"));
    }

    // ========================================================================
    // Experience Tests
    // ========================================================================

    #[test]
    fn test_experience_create_assigns_priority() {
        let storage = MockStorage::new();
        storage.add_page(page()).unwrap();

        let first = storage.experience_create(&make_new_experience(page())).unwrap();
        let second = storage.experience_create(&make_new_experience(page())).unwrap();

        assert_ne!(first.experience_id, second.experience_id);
        assert_eq!(second.priority, first.priority + 1);
        assert!(storage.experience_get(first.experience_id).unwrap().is_some());
    }

    #[test]
    fn test_experience_create_unknown_page() {
        let storage = MockStorage::new();
        let err = storage
            .experience_create(&make_new_experience(page()))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_experiment_rel_create() {
        let storage = MockStorage::new();
        storage.add_page(page()).unwrap();
        let experiment = storage
            .add_experiment(page(), ExperienceId::DEFAULT, "Hero test")
            .unwrap();
        let experience = storage.experience_create(&make_new_experience(page())).unwrap();

        let rel = storage
            .experiment_rel_create(experiment.experiment_id, experience.experience_id)
            .unwrap();
        assert_eq!(rel.name, "Variant");
        assert_eq!(rel.split, 0.0);

        let err = storage
            .experiment_rel_create(ExperimentId::new(404), experience.experience_id)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    // ========================================================================
    // Transaction Tests
    // ========================================================================

    #[test]
    fn test_rollback_restores_state() {
        let storage = MockStorage::new();
        storage.add_page(page()).unwrap();

        let result: SegmentsResult<()> = in_transaction(&storage, |_tx| {
            storage.experience_create(&make_new_experience(page()))?;
            Err(SegmentsError::Validation(ValidationError::RequiredFieldMissing {
                field: "name".to_string(),
            }))
        });

        assert!(result.is_err());
        assert_eq!(storage.experience_count().unwrap(), 0);
        assert!(!storage.in_transaction().unwrap());
    }

    #[test]
    fn test_commit_keeps_state() {
        let storage = MockStorage::new();
        storage.add_page(page()).unwrap();

        in_transaction(&storage, |_tx| {
            storage.experience_create(&make_new_experience(page()))
        })
        .unwrap();

        assert_eq!(storage.experience_count().unwrap(), 1);
    }

    #[test]
    fn test_joined_scope_defers_to_owner() {
        let storage = MockStorage::new();
        storage.add_page(page()).unwrap();

        let outer = storage.begin().unwrap();
        assert!(outer.is_owner());

        let inner = storage.begin().unwrap();
        assert!(!inner.is_owner());
        assert_eq!(inner.id(), outer.id());
        storage.experience_create(&make_new_experience(page())).unwrap();
        storage.commit(inner).unwrap();
        assert!(storage.in_transaction().unwrap());

        storage.rollback(outer).unwrap();
        assert_eq!(storage.experience_count().unwrap(), 0);
    }

    #[test]
    fn test_joined_rollback_marks_rollback_only() {
        let storage = MockStorage::new();
        storage.add_page(page()).unwrap();

        let outer = storage.begin().unwrap();
        storage.experience_create(&make_new_experience(page())).unwrap();
        let inner = storage.begin().unwrap();
        storage.rollback(inner).unwrap();

        let err = storage.commit(outer).unwrap_err();
        assert!(matches!(
            err,
            SegmentsError::Storage(StorageError::TransactionFailed { .. })
        ));
        assert_eq!(storage.experience_count().unwrap(), 0);
    }

    #[test]
    fn test_commit_without_open_transaction() {
        let storage = MockStorage::new();
        let err = storage.commit(TxScope::new(9, true)).unwrap_err();
        assert!(matches!(
            err,
            SegmentsError::Storage(StorageError::TransactionFailed { .. })
        ));
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
