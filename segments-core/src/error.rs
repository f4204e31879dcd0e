//! Error types for segments operations

use crate::EntityType;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type:?} with id {id}")]
    NotFound { entity_type: EntityType, id: String },

    #[error("Insert failed for {entity_type:?}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Update failed for {entity_type:?} with id {id}: {reason}")]
    UpdateFailed {
        entity_type: EntityType,
        id: String,
        reason: String,
    },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Processor {processor_key} mixes experience-keyed and field-keyed entries")]
    MixedProcessorShape { processor_key: String },

    #[error("Malformed editable values document: {reason}")]
    MalformedDocument { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all segments errors.
#[derive(Debug, Clone, Error)]
pub enum SegmentsError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl SegmentsError {
    /// Shorthand for a missing entity.
    pub fn not_found(entity_type: EntityType, id: impl ToString) -> Self {
        SegmentsError::Storage(StorageError::NotFound {
            entity_type,
            id: id.to_string(),
        })
    }

    /// True when the error reports a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SegmentsError::Storage(StorageError::NotFound { .. }))
    }
}

/// Result type alias for segments operations.
pub type SegmentsResult<T> = Result<T, SegmentsError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            entity_type: EntityType::Layout,
            id: "1001".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Entity not found"));
        assert!(msg.contains("Layout"));
        assert!(msg.contains("1001"));
    }

    #[test]
    fn test_validation_error_display_mixed_shape() {
        let err = ValidationError::MixedProcessorShape {
            processor_key: "text-processor".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("text-processor"));
        assert!(msg.contains("mixes"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "experience_key_prefix".to_string(),
            value: "".to_string(),
            reason: "must not be empty".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("experience_key_prefix"));
        assert!(msg.contains("must not be empty"));
    }

    #[test]
    fn test_segments_error_from_variants() {
        let storage = SegmentsError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, SegmentsError::Storage(_)));

        let validation = SegmentsError::from(ValidationError::RequiredFieldMissing {
            field: "name".to_string(),
        });
        assert!(matches!(validation, SegmentsError::Validation(_)));

        let config = SegmentsError::from(ConfigError::MissingRequired {
            field: "default_locale".to_string(),
        });
        assert!(matches!(config, SegmentsError::Config(_)));
    }

    #[test]
    fn test_not_found_helper() {
        let err = SegmentsError::not_found(EntityType::Experiment, 12);
        assert!(err.is_not_found());
        assert!(err.to_string().contains("12"));
        assert!(!SegmentsError::from(StorageError::LockPoisoned).is_not_found());
    }
}
