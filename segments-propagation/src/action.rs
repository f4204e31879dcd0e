//! Request boundary for "add experience".
//!
//! Errors never leave this module: they are logged and answered with a
//! generic 400 body so callers see a stable message.

use crate::orchestration::{create_experience_with_content, AddExperienceRequest};
use segments_core::{PropagationConfig, SegmentsResult, ValidationError};
use segments_storage::{in_transaction, SegmentsStores, TransactionManager};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;

/// Status code plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResponse {
    pub status: u16,
    pub body: Value,
}

impl ActionResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: STATUS_OK,
            body,
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self {
            status: STATUS_BAD_REQUEST,
            body: json!({ "error": message }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Check `config`, parse `params`, create the experience with its content
/// in one transaction, and render the result.
pub fn handle_add_experience<M, S>(
    manager: &M,
    stores: &S,
    config: &PropagationConfig,
    params: &HashMap<String, String>,
) -> ActionResponse
where
    M: TransactionManager + ?Sized,
    S: SegmentsStores + ?Sized,
{
    let result = config
        .validate()
        .and_then(|()| AddExperienceRequest::from_params(params))
        .and_then(|request| {
            in_transaction(manager, |tx| {
                create_experience_with_content(tx, stores, config, &request)
            })
        });

    respond(result.and_then(|creation| to_body(&creation)), config)
}

fn to_body<T: Serialize>(value: &T) -> SegmentsResult<Value> {
    serde_json::to_value(value).map_err(|e| {
        ValidationError::MalformedDocument {
            reason: e.to_string(),
        }
        .into()
    })
}

fn respond(result: SegmentsResult<Value>, config: &PropagationConfig) -> ActionResponse {
    match result {
        Ok(body) => ActionResponse::ok(body),
        Err(err) => {
            tracing::error!(error = %err, "Failed to add experience");
            ActionResponse::bad_request(&config.unexpected_error_message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segments_core::{SegmentsError, StorageError};

    #[test]
    fn test_respond_ok() {
        let config = PropagationConfig::default();
        let response = respond(Ok(json!({ "a": 1 })), &config);
        assert!(response.is_success());
        assert_eq!(response.body, json!({ "a": 1 }));
    }

    #[test]
    fn test_respond_hides_error_details() {
        let config = PropagationConfig::default();
        let err = SegmentsError::Storage(StorageError::LockPoisoned);
        let response = respond(Err(err), &config);

        assert_eq!(response.status, STATUS_BAD_REQUEST);
        assert_eq!(
            response.body,
            json!({ "error": "an-unexpected-error-occurred" })
        );
    }

    #[test]
    fn test_respond_uses_configured_message() {
        let config = PropagationConfig {
            unexpected_error_message: "oops".to_string(),
            ..PropagationConfig::default()
        };
        let err = SegmentsError::not_found(segments_core::EntityType::Experiment, 3);
        let response = respond(Err(err), &config);
        assert_eq!(response.body["error"], "oops");
    }
}
