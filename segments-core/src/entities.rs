//! Core entity structures

use crate::{
    ComponentInstanceId, ComponentLinkId, EntryId, ExperienceId, ExperimentId, ExperimentRelId,
    GroupId, PlId, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Entity type discriminator for polymorphic references and error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    /// A page (published or draft).
    Layout,
    /// A page template or display page.
    LayoutPageTemplateEntry,
    /// Layout structure record of a page.
    Structure,
    Experience,
    Experiment,
    ExperimentRel,
    ComponentLink,
    Preferences,
}

impl EntityType {
    /// Convert to the portal class name used in request parameters.
    pub fn as_class_name(&self) -> &'static str {
        match self {
            EntityType::Layout => "Layout",
            EntityType::LayoutPageTemplateEntry => "LayoutPageTemplateEntry",
            EntityType::Structure => "LayoutPageTemplateStructure",
            EntityType::Experience => "SegmentsExperience",
            EntityType::Experiment => "SegmentsExperiment",
            EntityType::ExperimentRel => "SegmentsExperimentRel",
            EntityType::ComponentLink => "FragmentEntryLink",
            EntityType::Preferences => "PortletPreferences",
        }
    }

    /// Parse a page class name. Only page-like types can own experiences.
    pub fn from_page_class_name(s: &str) -> Option<Self> {
        match s.trim() {
            "Layout" | "layout" => Some(EntityType::Layout),
            "LayoutPageTemplateEntry" | "layout-page-template-entry" => {
                Some(EntityType::LayoutPageTemplateEntry)
            }
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_class_name())
    }
}

/// Reference to a page entity by class and primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub id: PlId,
}

impl EntityRef {
    pub fn new(entity_type: EntityType, id: PlId) -> Self {
        Self { entity_type, id }
    }

    pub fn layout(id: PlId) -> Self {
        Self::new(EntityType::Layout, id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.id)
    }
}

/// Experience - a named content variant of a page.
/// The DEFAULT experience exists implicitly and is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub experience_id: ExperienceId,
    pub group_id: GroupId,
    pub entity: EntityRef,
    /// Targeting segment entry
    pub entry_id: EntryId,
    /// Display name keyed by locale
    pub name: BTreeMap<String, String>,
    pub active: bool,
    pub priority: i32,
    pub created_at: Timestamp,
}

impl Experience {
    /// Name for the given locale, falling back to any available name.
    pub fn name_for(&self, locale: &str) -> Option<&str> {
        self.name
            .get(locale)
            .or_else(|| self.name.values().next())
            .map(String::as_str)
    }
}

/// Attributes for a new experience, handed to the experience store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExperience {
    pub group_id: GroupId,
    pub entity: EntityRef,
    pub entry_id: EntryId,
    pub name: BTreeMap<String, String>,
    pub active: bool,
}

/// Experiment - an A/B test running against one base experience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: ExperimentId,
    pub entity: EntityRef,
    /// Experience the experiment was started on (DEFAULT when none)
    pub experience_id: ExperienceId,
    pub name: String,
}

/// Relation between an experiment and one of its variant experiences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRel {
    pub experiment_rel_id: ExperimentRelId,
    pub experiment_id: ExperimentId,
    pub experience_id: ExperienceId,
    pub name: String,
    /// Traffic fraction in [0, 1]
    pub split: f64,
}

/// Content component attached to a page, with its editable values document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentLink {
    pub component_link_id: ComponentLinkId,
    pub group_id: GroupId,
    pub entity: EntityRef,
    /// Serialized editable values JSON
    pub editable_values: String,
}

/// Configuration blob of one component instance on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencesEntry {
    /// Page that owns the preferences
    pub owner: PlId,
    pub component_instance_id: ComponentInstanceId,
    /// Opaque preferences document, copied verbatim
    pub preferences: String,
}
