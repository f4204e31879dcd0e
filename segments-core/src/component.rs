//! Component instance identifiers.
//!
//! A component placed on a page is addressed by an instance id of the form
//!
//! ```text
//! <component>[_INSTANCE_<instance>][_EXPERIENCE_<experienceId>]
//! ```
//!
//! The experience segment is omitted for the DEFAULT experience, so ids
//! written before experiences existed keep resolving to DEFAULT.

use crate::{EntityIdType, ExperienceId, SegmentsError, SegmentsResult, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

const INSTANCE_SEPARATOR: &str = "_INSTANCE_";
const EXPERIENCE_SEPARATOR: &str = "_EXPERIENCE_";

/// Instance id of a component on a page, possibly bound to an experience.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentInstanceId(String);

impl ComponentInstanceId {
    /// Wrap a raw instance id without validating it.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build an instance id from its parts.
    pub fn compose(component: &str, instance: Option<&str>, experience: ExperienceId) -> Self {
        let mut raw = component.to_string();
        if let Some(instance) = instance {
            raw.push_str(INSTANCE_SEPARATOR);
            raw.push_str(instance);
        }
        Self(raw).with_experience_unchecked(experience)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Id without its experience segment.
    fn base(&self) -> &str {
        match self.0.rfind(EXPERIENCE_SEPARATOR) {
            Some(pos) => &self.0[..pos],
            None => &self.0,
        }
    }

    /// Registry key of the component (everything before the instance segment).
    pub fn component_name(&self) -> &str {
        let base = self.base();
        match base.find(INSTANCE_SEPARATOR) {
            Some(pos) => &base[..pos],
            None => base,
        }
    }

    /// Instance segment, if the component is instanceable.
    pub fn instance(&self) -> Option<&str> {
        let base = self.base();
        base.find(INSTANCE_SEPARATOR)
            .map(|pos| &base[pos + INSTANCE_SEPARATOR.len()..])
    }

    /// Experience encoded in this id; DEFAULT when no segment is present.
    pub fn experience_id(&self) -> SegmentsResult<ExperienceId> {
        match self.0.rfind(EXPERIENCE_SEPARATOR) {
            None => Ok(ExperienceId::DEFAULT),
            Some(pos) => {
                let raw = &self.0[pos + EXPERIENCE_SEPARATOR.len()..];
                ExperienceId::parse(raw).map_err(|_| {
                    SegmentsError::Validation(ValidationError::InvalidValue {
                        field: "componentInstanceId".to_string(),
                        reason: format!("'{}' has an unparseable experience segment", self.0),
                    })
                })
            }
        }
    }

    /// Same component and instance, bound to another experience.
    pub fn with_experience(&self, experience: ExperienceId) -> SegmentsResult<Self> {
        self.experience_id()?;
        Ok(self.clone().with_experience_unchecked(experience))
    }

    fn with_experience_unchecked(self, experience: ExperienceId) -> Self {
        let mut raw = self.base().to_string();
        if !experience.is_default() {
            raw.push_str(EXPERIENCE_SEPARATOR);
            raw.push_str(&experience.to_string());
        }
        Self(raw)
    }
}

impl fmt::Display for ComponentInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentInstanceId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
