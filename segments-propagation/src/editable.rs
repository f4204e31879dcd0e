//! Editable values documents and their per-experience propagation.
//!
//! A component's editable values are stored as
//!
//! ```text
//! { processorKey: { editableKey: { "<prefix><experienceId>": value,
//!                                  "defaultValue": value } } }
//! ```
//!
//! Some older components key the processor map by experience directly
//! (`{ processorKey: { "<prefix><experienceId>": value } }`). The shape is
//! decided once per processor; a processor mixing both shapes is rejected.

use segments_core::{ExperienceId, PropagationConfig, SegmentsResult, ValidationError};
use serde_json::{Map, Value};

/// How the entries of one processor are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorShape {
    /// `{ editableKey: { experienceKey: value, ... } }`
    KeyedByField,
    /// `{ experienceKey: value }` (legacy)
    KeyedByExperience,
}

impl ProcessorShape {
    /// Classify a processor from its first key. `None` for an empty processor.
    pub fn classify(
        processor_key: &str,
        processor: &Map<String, Value>,
        config: &PropagationConfig,
    ) -> SegmentsResult<Option<Self>> {
        let mut keys = processor.keys();
        let shape = match keys.next() {
            None => return Ok(None),
            Some(first) => Self::of_key(first, config),
        };

        if keys.any(|key| Self::of_key(key, config) != shape) {
            return Err(ValidationError::MixedProcessorShape {
                processor_key: processor_key.to_string(),
            }
            .into());
        }
        Ok(Some(shape))
    }

    fn of_key(key: &str, config: &PropagationConfig) -> Self {
        if config.is_experience_key(key) {
            ProcessorShape::KeyedByExperience
        } else {
            ProcessorShape::KeyedByField
        }
    }
}

/// Parsed editable values of one component.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditableValuesDocument {
    root: Map<String, Value>,
}

impl EditableValuesDocument {
    /// Parse a serialized document. An empty string is an empty document.
    pub fn parse(raw: &str) -> SegmentsResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            ValidationError::MalformedDocument {
                reason: e.to_string(),
            }
        })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> SegmentsResult<Self> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(ValidationError::MalformedDocument {
                reason: format!("expected an object at the root, found {}", type_name(&other)),
            }
            .into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    pub fn to_json_string(&self) -> String {
        Value::Object(self.root.clone()).to_string()
    }

    /// Build a copy of this document where every editable field also holds
    /// a value for `new`, resolved from `base` or from the field's default.
    pub fn propagate(
        &self,
        config: &PropagationConfig,
        base: ExperienceId,
        new: ExperienceId,
    ) -> SegmentsResult<Self> {
        let base_key = config.experience_key(base);
        let new_key = config.experience_key(new);
        let mut root = Map::with_capacity(self.root.len());

        for (processor_key, processor) in &self.root {
            let propagated = match processor {
                Value::Object(processor) => Value::Object(propagate_processor(
                    config,
                    processor_key,
                    processor,
                    &base_key,
                    &new_key,
                )?),
                // Only object processors carry editable fields
                other => other.clone(),
            };
            root.insert(processor_key.clone(), propagated);
        }

        Ok(Self { root })
    }
}

fn propagate_processor(
    config: &PropagationConfig,
    processor_key: &str,
    processor: &Map<String, Value>,
    base_key: &str,
    new_key: &str,
) -> SegmentsResult<Map<String, Value>> {
    let mut out = processor.clone();

    match ProcessorShape::classify(processor_key, processor, config)? {
        None => {}
        Some(ProcessorShape::KeyedByExperience) => {
            if let Some(value) = processor.get(base_key) {
                out.insert(new_key.to_string(), value.clone());
            }
        }
        Some(ProcessorShape::KeyedByField) => {
            for (editable_key, editable) in processor {
                let Value::Object(editable) = editable else {
                    return Err(ValidationError::MalformedDocument {
                        reason: format!(
                            "{}.{} must be an object, found {}",
                            processor_key,
                            editable_key,
                            type_name(editable)
                        ),
                    }
                    .into());
                };

                let Some(resolved) = resolve_value(config, editable, base_key) else {
                    continue;
                };

                let mut editable = editable.clone();
                editable.insert(new_key.to_string(), resolved);
                out.insert(editable_key.clone(), Value::Object(editable));
            }
        }
    }

    Ok(out)
}

/// Base experience value, else the default wrapped as `{ defaultValue: v }`.
fn resolve_value(
    config: &PropagationConfig,
    editable: &Map<String, Value>,
    base_key: &str,
) -> Option<Value> {
    if let Some(value) = editable.get(base_key) {
        return Some(value.clone());
    }
    editable.get(&config.default_value_key).map(|default| {
        let mut wrapped = Map::new();
        wrapped.insert(config.default_value_key.clone(), default.clone());
        Value::Object(wrapped)
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segments_core::{EntityIdType, SegmentsError};
    use serde_json::json;

    fn config() -> PropagationConfig {
        PropagationConfig::default()
    }

    fn propagate(doc: Value, base: i64, new: i64) -> SegmentsResult<Value> {
        EditableValuesDocument::from_value(doc)?
            .propagate(&config(), ExperienceId::new(base), ExperienceId::new(new))
            .map(EditableValuesDocument::into_value)
    }

    #[test]
    fn test_default_value_fallback() {
        let out = propagate(
            json!({ "text": { "X": { "defaultValue": "v" } } }),
            0,
            5,
        )
        .unwrap();

        assert_eq!(
            out,
            json!({ "text": { "X": {
                "defaultValue": "v",
                "experience-5": { "defaultValue": "v" }
            } } })
        );
    }

    #[test]
    fn test_base_value_takes_precedence() {
        let out = propagate(
            json!({ "text": { "X": { "experience-3": "b", "defaultValue": "v" } } }),
            3,
            8,
        )
        .unwrap();

        assert_eq!(out["text"]["X"]["experience-8"], json!("b"));
        assert_eq!(out["text"]["X"]["experience-3"], json!("b"));
        assert_eq!(out["text"]["X"]["defaultValue"], json!("v"));
    }

    #[test]
    fn test_field_without_value_is_skipped() {
        let doc = json!({ "text": { "X": { "experience-9": "other" }, "Y": {} } });
        let out = propagate(doc.clone(), 0, 5).unwrap();
        assert_eq!(out, doc);
    }

    #[test]
    fn test_keyed_by_experience_processor() {
        let out = propagate(
            json!({ "freemarker": {
                "experience-0": { "config": 1 },
                "experience-4": { "config": 2 }
            } }),
            0,
            6,
        )
        .unwrap();

        assert_eq!(out["freemarker"]["experience-6"], json!({ "config": 1 }));
        assert_eq!(out["freemarker"]["experience-4"], json!({ "config": 2 }));
    }

    #[test]
    fn test_keyed_by_experience_without_base_entry() {
        let doc = json!({ "freemarker": { "experience-4": { "config": 2 } } });
        let out = propagate(doc.clone(), 0, 6).unwrap();
        assert_eq!(out, doc);
    }

    #[test]
    fn test_prefixed_field_name_is_not_an_experience_key() {
        let out = propagate(
            json!({ "text": { "experience-title": { "defaultValue": "v" } } }),
            0,
            5,
        )
        .unwrap();

        assert_eq!(
            out["text"]["experience-title"]["experience-5"],
            json!({ "defaultValue": "v" })
        );
    }

    #[test]
    fn test_mixed_processor_shape_rejected() {
        let err = propagate(
            json!({ "text": {
                "X": { "defaultValue": "v" },
                "experience-0": { "defaultValue": "w" }
            } }),
            0,
            5,
        )
        .unwrap_err();

        match err {
            SegmentsError::Validation(ValidationError::MixedProcessorShape { processor_key }) => {
                assert_eq!(processor_key, "text")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_object_processor_copied() {
        let doc = json!({ "version": 2, "text": {} });
        let out = propagate(doc.clone(), 0, 1).unwrap();
        assert_eq!(out, doc);
    }

    #[test]
    fn test_non_object_editable_rejected() {
        let err = propagate(json!({ "text": { "X": "plain" } }), 0, 1).unwrap_err();
        assert!(matches!(
            err,
            SegmentsError::Validation(ValidationError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let doc = EditableValuesDocument::from_value(
            json!({ "text": { "X": { "defaultValue": "v" } } }),
        )
        .unwrap();
        let before = doc.clone();

        let out = doc
            .propagate(&config(), ExperienceId::DEFAULT, ExperienceId::new(2))
            .unwrap();

        assert_eq!(doc, before);
        assert_ne!(out, before);
    }

    #[test]
    fn test_parse_edge_cases() {
        assert!(EditableValuesDocument::parse("").unwrap().is_empty());
        assert!(EditableValuesDocument::parse("  ").unwrap().is_empty());
        assert!(matches!(
            EditableValuesDocument::parse("[1, 2]"),
            Err(SegmentsError::Validation(ValidationError::MalformedDocument { .. }))
        ));
        assert!(EditableValuesDocument::parse("{not json").is_err());
    }

    #[test]
    fn test_custom_prefix() {
        let config = PropagationConfig {
            experience_key_prefix: "segments-experience-id-".to_string(),
            ..Default::default()
        };
        let doc = EditableValuesDocument::from_value(json!({
            "text": { "X": { "segments-experience-id-0": "base" } }
        }))
        .unwrap();

        let out = doc
            .propagate(&config, ExperienceId::DEFAULT, ExperienceId::new(11))
            .unwrap()
            .into_value();
        assert_eq!(out["text"]["X"]["segments-experience-id-11"], json!("base"));
    }

    #[test]
    fn test_key_order_preserved() {
        let raw = r#"{"b":{"X":{"defaultValue":"v"}},"a":{}}"#;
        let out = EditableValuesDocument::parse(raw)
            .unwrap()
            .propagate(&config(), ExperienceId::DEFAULT, ExperienceId::new(1))
            .unwrap()
            .to_json_string();
        assert_eq!(
            out,
            r#"{"b":{"X":{"defaultValue":"v","experience-1":{"defaultValue":"v"}}},"a":{}}"#
        );
    }
}
