//! Creation of a new experience together with its content.

use crate::propagator::ExperienceContentPropagator;
use segments_core::{
    ComponentLinkId, DraftPolicy, EntityIdType, EntityRef, EntityType, EntryId, Experience,
    ExperienceId, Experiment, ExperimentId, ExperimentRel, ExperimentRelId, GroupId,
    NewExperience, PlId, PropagationConfig, SegmentsError, SegmentsResult, ValidationError,
};
use segments_storage::{SegmentsStores, TxScope};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// REQUEST
// ============================================================================

/// Input of `create_experience_with_content`.
#[derive(Debug, Clone, PartialEq)]
pub struct AddExperienceRequest {
    pub group_id: GroupId,
    pub entity: EntityRef,
    pub name: String,
    /// Ignored when an experiment drives the new experience
    pub active: bool,
    /// Ignored when an experiment drives the new experience
    pub entry_id: EntryId,
    pub experiment_id: Option<ExperimentId>,
}

impl AddExperienceRequest {
    pub fn new(group_id: GroupId, entity: EntityRef, name: impl Into<String>) -> Self {
        Self {
            group_id,
            entity,
            name: name.into(),
            active: true,
            entry_id: EntryId::DEFAULT,
            experiment_id: None,
        }
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_entry(mut self, entry_id: EntryId) -> Self {
        self.entry_id = entry_id;
        self
    }

    pub fn with_experiment(mut self, experiment_id: ExperimentId) -> Self {
        self.experiment_id = Some(experiment_id);
        self
    }

    /// Build a request from action parameters.
    ///
    /// Recognised keys: `groupId`, `classPK`, `className` (defaults to
    /// `Layout`), `name`, `active`, `segmentsEntryId`, `segmentsExperimentId`.
    /// An experiment id of `0` means no experiment.
    pub fn from_params(params: &HashMap<String, String>) -> SegmentsResult<Self> {
        let required = |key: &str| {
            params.get(key).ok_or_else(|| {
                SegmentsError::Validation(ValidationError::RequiredFieldMissing {
                    field: key.to_string(),
                })
            })
        };

        let group_id = GroupId::parse(required("groupId")?)?;
        let entity_type = match params.get("className") {
            None => EntityType::Layout,
            Some(raw) => EntityType::from_page_class_name(raw).ok_or_else(|| {
                SegmentsError::Validation(ValidationError::InvalidValue {
                    field: "className".to_string(),
                    reason: format!("'{}' cannot own experiences", raw),
                })
            })?,
        };
        let entity = EntityRef::new(entity_type, PlId::parse(required("classPK")?)?);
        let name = required("name")?.clone();

        let active = match params.get("active").map(|s| s.trim().to_lowercase()) {
            None => true,
            Some(raw) => match raw.as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(SegmentsError::Validation(ValidationError::InvalidValue {
                        field: "active".to_string(),
                        reason: format!("'{}' is not a boolean", raw),
                    }))
                }
            },
        };

        let entry_id = params
            .get("segmentsEntryId")
            .map(|raw| EntryId::parse(raw))
            .transpose()?
            .unwrap_or(EntryId::DEFAULT);

        let experiment_id = params
            .get("segmentsExperimentId")
            .map(|raw| ExperimentId::parse(raw))
            .transpose()?
            .filter(|id| id.as_i64() != 0);

        Ok(Self {
            group_id,
            entity,
            name,
            active,
            entry_id,
            experiment_id,
        })
    }
}

// ============================================================================
// RESULT
// ============================================================================

/// Public fields of the created experience.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceSummary {
    pub experience_id: ExperienceId,
    pub entry_id: EntryId,
    pub name: String,
    pub active: bool,
    pub priority: i32,
}

impl ExperienceSummary {
    fn from_experience(experience: &Experience, locale: &str) -> Self {
        Self {
            experience_id: experience.experience_id,
            entry_id: experience.entry_id,
            name: experience.name_for(locale).unwrap_or_default().to_string(),
            active: experience.active,
            priority: experience.priority,
        }
    }
}

/// Fields of the experiment relation created for the new experience.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRelSummary {
    pub experiment_rel_id: ExperimentRelId,
    pub experiment_id: ExperimentId,
    pub experience_id: ExperienceId,
    pub name: String,
    pub split: f64,
}

impl From<ExperimentRel> for ExperimentRelSummary {
    fn from(rel: ExperimentRel) -> Self {
        Self {
            experiment_rel_id: rel.experiment_rel_id,
            experiment_id: rel.experiment_id,
            experience_id: rel.experience_id,
            name: rel.name,
            split: rel.split,
        }
    }
}

/// Everything the caller needs to render the new experience.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceCreation {
    pub experience: ExperienceSummary,
    /// Structure data copied from the base experience
    pub layout_data: Value,
    /// Propagated editable values per component
    pub component_links: BTreeMap<ComponentLinkId, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_rel: Option<ExperimentRelSummary>,
}

/// Structure data is opaque to the propagator; expose it as JSON when it is.
fn layout_data_value(data: &str) -> Value {
    if data.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(data).unwrap_or_else(|_| Value::String(data.to_string()))
}

// ============================================================================
// ORCHESTRATION
// ============================================================================

/// Create an experience for `request.entity` and give it a copy of the base
/// experience's content: structure, editable values and preferences, on the
/// page and (per `DraftPolicy`) on its draft.
///
/// The base experience is the experiment's experience when an experiment is
/// given, DEFAULT otherwise. All writes go through the caller's `tx`; any
/// error leaves the rollback to the transaction owner.
pub fn create_experience_with_content<S>(
    tx: &TxScope,
    stores: &S,
    config: &PropagationConfig,
    request: &AddExperienceRequest,
) -> SegmentsResult<ExperienceCreation>
where
    S: SegmentsStores + ?Sized,
{
    let experiment = request
        .experiment_id
        .map(|id| fetch_experiment(stores, id))
        .transpose()?;

    let base = experiment
        .as_ref()
        .map(|experiment| experiment.experience_id)
        .unwrap_or(ExperienceId::DEFAULT);

    let attributes = new_experience(stores, config, request, experiment.as_ref())?;
    let experience = stores.experience_create(&attributes)?;
    let new = experience.experience_id;

    let propagator = ExperienceContentPropagator::new(stores, config);
    let layout_data =
        propagator.propagate_structure(tx, request.group_id, request.entity, new, base)?;
    let editable_values =
        propagator.propagate_editable_values(tx, request.group_id, request.entity, new, base)?;

    let experiment_rel = match &experiment {
        Some(experiment) => Some(stores.experiment_rel_create(experiment.experiment_id, new)?),
        None => None,
    };

    let branch_draft = match config.draft_policy {
        DraftPolicy::Always => true,
        DraftPolicy::ExperimentOnly => experiment.is_some(),
    };
    if branch_draft {
        if let Some(draft) = stores.draft_fetch(request.entity)? {
            propagator.propagate_structure(tx, request.group_id, draft, new, base)?;
            propagator.propagate_editable_values(tx, request.group_id, draft, new, base)?;
            propagator.propagate_preferences(tx, draft.id, base, new)?;
            tracing::debug!(tx_id = tx.id(), %draft, experience_id = %new, "Branched draft page");
        }
    }

    propagator.propagate_preferences(tx, request.entity.id, base, new)?;

    let mut component_links = BTreeMap::new();
    for (id, raw) in editable_values {
        let value = serde_json::from_str(&raw).map_err(|e| ValidationError::MalformedDocument {
            reason: e.to_string(),
        })?;
        component_links.insert(id, value);
    }

    tracing::info!(
        tx_id = tx.id(),
        entity = %request.entity,
        experience_id = %new,
        base_experience_id = %base,
        experiment_id = ?request.experiment_id,
        components = component_links.len(),
        "Created experience with content"
    );

    Ok(ExperienceCreation {
        experience: ExperienceSummary::from_experience(&experience, &config.default_locale),
        layout_data: layout_data_value(&layout_data),
        component_links,
        experiment_rel: experiment_rel.map(ExperimentRelSummary::from),
    })
}

fn fetch_experiment<S>(stores: &S, id: ExperimentId) -> SegmentsResult<Experiment>
where
    S: SegmentsStores + ?Sized,
{
    stores
        .experiment_get(id)?
        .ok_or_else(|| SegmentsError::not_found(EntityType::Experiment, id))
}

/// Attributes of the new experience. Experiment variants start inactive and
/// target the same entry as the experience the experiment runs on.
fn new_experience<S>(
    stores: &S,
    config: &PropagationConfig,
    request: &AddExperienceRequest,
    experiment: Option<&Experiment>,
) -> SegmentsResult<NewExperience>
where
    S: SegmentsStores + ?Sized,
{
    let (active, entry_id) = match experiment {
        None => (request.active, request.entry_id),
        Some(experiment) if experiment.experience_id.is_default() => (false, EntryId::DEFAULT),
        Some(experiment) => {
            let base = stores
                .experience_get(experiment.experience_id)?
                .ok_or_else(|| {
                    SegmentsError::not_found(EntityType::Experience, experiment.experience_id)
                })?;
            (false, base.entry_id)
        }
    };

    let mut name = BTreeMap::new();
    name.insert(config.default_locale.clone(), request.name.clone());

    Ok(NewExperience {
        group_id: request.group_id,
        entity: request.entity,
        entry_id,
        name,
        active,
    })
}
