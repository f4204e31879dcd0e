//! Segments Test Utilities
//!
//! Shared test infrastructure for the segments workspace:
//! - Proptest generators for ids, component instance ids and editable values
//! - Seeded page fixtures on top of `MockStorage`
//! - Assertions for segments error variants

// Re-export mock storage from its source crate
pub use segments_storage::MockStorage;

// Re-export core types for convenience
pub use segments_core::{
    ComponentInstanceId, ComponentLinkId, EntityIdType, EntityRef, EntityType, EntryId,
    ExperienceId, ExperimentId, GroupId, PlId, PreferencesEntry, PropagationConfig,
    SegmentsError, SegmentsResult, StorageError, ValidationError,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for segments types.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    /// Generate an ExperienceId, DEFAULT included.
    pub fn arb_experience_id() -> impl Strategy<Value = ExperienceId> {
        prop_oneof![
            1 => Just(ExperienceId::DEFAULT),
            4 => (1i64..10_000).prop_map(ExperienceId::new),
        ]
    }

    /// Generate a component name such as `banner` or `com_acme_menu`.
    pub fn arb_component_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,6}(_[a-z][a-z0-9]{0,6}){0,2}"
    }

    /// Generate a well-formed ComponentInstanceId.
    pub fn arb_component_instance_id() -> impl Strategy<Value = ComponentInstanceId> {
        (
            arb_component_name(),
            prop::option::of("[a-zA-Z0-9]{4}"),
            arb_experience_id(),
        )
            .prop_map(|(component, instance, experience)| {
                ComponentInstanceId::compose(&component, instance.as_deref(), experience)
            })
    }

    /// Generate a leaf editable value.
    pub fn arb_editable_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            "[ -~]{0,16}".prop_map(Value::String),
            any::<i32>().prop_map(Value::from),
            "[a-z]{1,8}\\.png".prop_map(|src| serde_json::json!({ "src": src })),
        ]
    }

    /// Generate one editable field keyed by experience.
    ///
    /// The base key and the default key are each present or not; unrelated
    /// experience keys use ids in `1000..2000`.
    pub fn arb_editable_field(prefix: &'static str, base: i64) -> impl Strategy<Value = Value> {
        (
            prop::option::of(arb_editable_value()),
            prop::option::of(arb_editable_value()),
            prop::option::of(arb_editable_value()),
            prop::collection::btree_map(1000i64..2000, arb_editable_value(), 0..3),
        )
            .prop_map(move |(base_value, default_value, config, others)| {
                let mut field = Map::new();
                if let Some(value) = base_value {
                    field.insert(format!("{}{}", prefix, base), value);
                }
                for (id, value) in others {
                    field.insert(format!("{}{}", prefix, id), value);
                }
                if let Some(value) = default_value {
                    field.insert("defaultValue".to_string(), value);
                }
                if let Some(value) = config {
                    field.insert("config".to_string(), value);
                }
                Value::Object(field)
            })
    }

    /// Generate an editable values document whose processors are keyed by
    /// field.
    pub fn arb_editable_document(prefix: &'static str, base: i64) -> impl Strategy<Value = Value> {
        let processor = prop::collection::btree_map(
            "[a-z]{1,8}",
            arb_editable_field(prefix, base),
            0..4,
        );
        prop::collection::btree_map("[a-z]{1,8}", processor, 0..4).prop_map(|processors| {
            Value::Object(
                processors
                    .into_iter()
                    .map(|(key, fields)| (key, Value::Object(fields.into_iter().collect())))
                    .collect(),
            )
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-seeded pages for propagation scenarios.

    use super::*;
    use segments_storage::{PreferencesStore, StructureStore};

    pub const GROUP_ID: i64 = 20;
    pub const PAGE_ID: i64 = 1001;
    pub const DRAFT_ID: i64 = 1002;

    pub const STRUCTURE_DATA: &str =
        r#"{"items":{"root":{"children":["row-1"],"type":"root"}},"version":1}"#;
    pub const DRAFT_STRUCTURE_DATA: &str =
        r#"{"items":{"root":{"children":["row-1","row-2"],"type":"root"}},"version":1}"#;

    /// Text component with a default value and a DEFAULT-experience value.
    pub const TEXT_EDITABLE_VALUES: &str = concat!(
        r#"{"text":{"title":{"experience-0":"Welcome","defaultValue":"Hello"},"#,
        r#""subtitle":{"defaultValue":"Sub"}}}"#
    );
    /// Legacy image component keyed by experience.
    pub const IMAGE_EDITABLE_VALUES: &str = r#"{"image":{"experience-0":{"src":"hero.png"}}}"#;

    /// A page seeded in `MockStorage`.
    pub struct SeededPage {
        pub storage: MockStorage,
        pub group_id: GroupId,
        pub page: EntityRef,
        pub draft: Option<EntityRef>,
        /// Component links of the published page
        pub component_links: Vec<ComponentLinkId>,
        /// Component links of the draft page
        pub draft_component_links: Vec<ComponentLinkId>,
    }

    /// Published page with a DEFAULT structure, two components and
    /// preferences for a deployed and an undeployed component.
    pub fn seeded_page() -> SegmentsResult<SeededPage> {
        let storage = MockStorage::new();
        let group_id = GroupId::new(GROUP_ID);
        let page = EntityRef::layout(PlId::new(PAGE_ID));

        storage.add_page(page)?;
        storage.structure_upsert(group_id, page, ExperienceId::DEFAULT, STRUCTURE_DATA)?;
        let component_links = vec![
            storage.add_component_link(group_id, page, TEXT_EDITABLE_VALUES)?,
            storage.add_component_link(group_id, page, IMAGE_EDITABLE_VALUES)?,
        ];

        storage.register_component("banner")?;
        storage.preferences_create(&preferences(page, "banner_INSTANCE_a1", "<banner/>"))?;
        storage.preferences_create(&preferences(page, "retired_INSTANCE_z9", "<retired/>"))?;

        Ok(SeededPage {
            storage,
            group_id,
            page,
            draft: None,
            component_links,
            draft_component_links: Vec::new(),
        })
    }

    /// `seeded_page` plus a draft page with its own structure, component
    /// and preferences.
    pub fn seeded_page_with_draft() -> SegmentsResult<SeededPage> {
        let mut seeded = seeded_page()?;
        let draft = EntityRef::layout(PlId::new(DRAFT_ID));

        seeded.storage.add_draft(seeded.page, draft)?;
        seeded.storage.structure_upsert(
            seeded.group_id,
            draft,
            ExperienceId::DEFAULT,
            DRAFT_STRUCTURE_DATA,
        )?;
        seeded.draft_component_links = vec![seeded.storage.add_component_link(
            seeded.group_id,
            draft,
            TEXT_EDITABLE_VALUES,
        )?];
        seeded
            .storage
            .preferences_create(&preferences(draft, "banner_INSTANCE_a1", "<banner draft/>"))?;

        seeded.draft = Some(draft);
        Ok(seeded)
    }

    /// Preferences entry owned by `page`.
    pub fn preferences(
        page: EntityRef,
        component_instance_id: &str,
        blob: &str,
    ) -> PreferencesEntry {
        PreferencesEntry {
            owner: page.id,
            component_instance_id: ComponentInstanceId::new(component_instance_id),
            preferences: blob.to_string(),
        }
    }

    /// Default configuration for tests.
    pub fn test_config() -> PropagationConfig {
        PropagationConfig::default()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for segments error variants.

    use super::*;

    /// Assert that a SegmentsResult is a NotFound storage error.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(
        result: &SegmentsResult<T>,
        entity_type: EntityType,
    ) {
        match result {
            Err(SegmentsError::Storage(StorageError::NotFound { entity_type: et, .. })) => {
                assert_eq!(*et, entity_type, "Wrong entity type in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", entity_type, other),
        }
    }

    /// Assert that a SegmentsResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &SegmentsResult<T>) {
        match result {
            Err(SegmentsError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a SegmentsResult is a Storage error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &SegmentsResult<T>) {
        match result {
            Err(SegmentsError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }
}
