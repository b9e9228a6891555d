//! Response classification.
//!
//! Decides from a response body alone whether a dispatch attempt succeeded.
//! Classification never fails: every outcome, including bodies that are not
//! JSON at all, maps to a [`Classification`] variant.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Body carried a truthy `isValid`; holds the body unchanged.
    Accepted(Value),
    /// Body carried an `error` field; holds its message.
    Rejected(String),
    /// Valid JSON without either marker.
    Malformed,
    /// Not valid JSON.
    Undecodable(String),
}

impl Classification {
    pub fn is_success(&self) -> bool {
        matches!(self, Classification::Accepted(_))
    }

    pub fn into_body(self) -> Option<Value> {
        match self {
            Classification::Accepted(body) => Some(body),
            _ => None,
        }
    }

    /// Human-readable cause for the failure variants.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Classification::Accepted(_) => None,
            Classification::Rejected(message) => Some(format!("API error: {message}")),
            Classification::Malformed => Some("API returned a malformed response".into()),
            Classification::Undecodable(reason) => {
                Some(format!("response could not be decoded: {reason}"))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseClassifier;

impl ResponseClassifier {
    pub fn classify_bytes(body: &[u8]) -> Classification {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => Self::classify_value(value),
            Err(err) => {
                log::warn!("could not decode response body as JSON: {}", err);
                Classification::Undecodable(err.to_string())
            }
        }
    }

    pub fn classify_value(body: Value) -> Classification {
        let Some(fields) = body.as_object() else {
            log::warn!("API returned a non-object response");
            return Classification::Malformed;
        };

        if fields.get("isValid").is_some_and(is_truthy) {
            log::debug!("message accepted by API");
            return Classification::Accepted(body);
        }

        if let Some(error) = fields.get("error") {
            let message = match error {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            log::warn!("API error: {}", message);
            return Classification::Rejected(message);
        }

        log::warn!("API returned an invalid response");
        Classification::Malformed
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_truthy_is_valid() {
        let body = json!({"isValid": true, "id": 7});
        assert_eq!(
            ResponseClassifier::classify_value(body.clone()),
            Classification::Accepted(body)
        );
        assert!(ResponseClassifier::classify_value(json!({"isValid": 1})).is_success());
    }

    #[test]
    fn surfaces_api_error() {
        let outcome = ResponseClassifier::classify_bytes(br#"{"error": "bad slug"}"#);
        assert_eq!(outcome, Classification::Rejected("bad slug".into()));
        assert_eq!(outcome.into_body(), None);
    }

    #[test]
    fn falsy_is_valid_with_error_is_rejected() {
        let outcome = ResponseClassifier::classify_value(json!({"isValid": false, "error": 42}));
        assert_eq!(outcome, Classification::Rejected("42".into()));
    }

    #[test]
    fn empty_and_non_object_bodies_are_malformed() {
        assert_eq!(ResponseClassifier::classify_value(json!({})), Classification::Malformed);
        assert_eq!(ResponseClassifier::classify_value(json!([1, 2])), Classification::Malformed);
        assert_eq!(
            ResponseClassifier::classify_value(json!({"isValid": ""})),
            Classification::Malformed
        );
    }

    #[test]
    fn non_json_is_undecodable() {
        let outcome = ResponseClassifier::classify_bytes(b"<html>502</html>");
        assert!(matches!(outcome, Classification::Undecodable(_)));
        assert!(outcome.failure_reason().unwrap().contains("decoded"));
    }
}
