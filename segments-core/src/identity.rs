//! Identity types for segments entities

use crate::{SegmentsError, SegmentsResult, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Common behaviour of the numeric primary keys used by the portal.
pub trait EntityIdType: Copy + Eq + fmt::Display {
    /// Field name used in validation errors.
    const FIELD: &'static str;

    fn new(value: i64) -> Self;

    fn as_i64(&self) -> i64;

    /// Parse an id coming from a request parameter or an encoded key.
    fn parse(raw: &str) -> SegmentsResult<Self> {
        raw.trim()
            .parse::<i64>()
            .map(Self::new)
            .map_err(|e| {
                SegmentsError::Validation(ValidationError::InvalidValue {
                    field: Self::FIELD.to_string(),
                    reason: format!("'{}' is not a valid id: {}", raw, e),
                })
            })
    }
}

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl EntityIdType for $name {
            const FIELD: &'static str = $field;

            fn new(value: i64) -> Self {
                Self(value)
            }

            fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = SegmentsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <Self as EntityIdType>::parse(s)
            }
        }
    };
}

define_entity_id!(
    /// Identifier of an experience (content variant).
    ExperienceId,
    "segmentsExperienceId"
);
define_entity_id!(
    /// Identifier of an A/B experiment.
    ExperimentId,
    "segmentsExperimentId"
);
define_entity_id!(
    /// Identifier of an experiment-to-experience relation.
    ExperimentRelId,
    "segmentsExperimentRelId"
);
define_entity_id!(
    /// Identifier of a targeting segment entry.
    EntryId,
    "segmentsEntryId"
);
define_entity_id!(
    /// Site scope that owns pages and their components.
    GroupId,
    "groupId"
);
define_entity_id!(
    /// Identifier of a content component attached to a page.
    ComponentLinkId,
    "fragmentEntryLinkId"
);
define_entity_id!(
    /// Primary key of a page entity (published or draft).
    PlId,
    "classPK"
);

impl ExperienceId {
    /// The implicit experience every entity has.
    pub const DEFAULT: ExperienceId = ExperienceId(0);

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }
}

impl EntryId {
    /// Entry targeting every visitor.
    pub const DEFAULT: EntryId = EntryId(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_id() {
        let id: ExperienceId = " 42 ".parse().unwrap();
        assert_eq!(id, ExperienceId::new(42));
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_parse_invalid_id_is_validation_error() {
        let err = ExperimentId::parse("abc").unwrap_err();
        match err {
            SegmentsError::Validation(ValidationError::InvalidValue { field, reason }) => {
                assert_eq!(field, "segmentsExperimentId");
                assert!(reason.contains("abc"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_default_experience() {
        assert!(ExperienceId::DEFAULT.is_default());
        assert!(!ExperienceId::new(7).is_default());
        assert_eq!(EntryId::DEFAULT.as_i64(), 0);
    }

    #[test]
    fn test_ids_serialize_as_numbers() {
        let json = serde_json::to_string(&PlId::new(1001)).unwrap();
        assert_eq!(json, "1001");
        let back: PlId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PlId::new(1001));
    }
}
