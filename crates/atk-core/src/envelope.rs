// ATK Core - Result envelopes
//
// Every operation ends in exactly one of two terminal outcomes. Which shape
// the failure takes is part of the operation's declared contract:
//
// - `Outcome<T>`: success value, or a bare message string
// - `Envelope<T>`: `{success, ...fields of T, error}` where a failure still
//   carries every field of `T` at its default

use serde::{Deserialize, Serialize};

/// Message-contract result: the typed success value or a descriptive string
pub type Outcome<T> = Result<T, String>;

/// Structured-contract result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,

    #[serde(flatten)]
    pub data: T,

    #[serde(default)]
    pub error: String,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: String::new(),
        }
    }

    /// Failure that still reports partial data (e.g. completed batch steps)
    pub fn failed_with(data: T, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn into_result(self) -> Result<T, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.error)
        }
    }
}

impl<T: Default> Envelope<T> {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::failed_with(T::default(), error)
    }
}

impl<T: Default> From<Outcome<T>> for Envelope<T> {
    fn from(outcome: Outcome<T>) -> Self {
        match outcome {
            Ok(data) => Self::ok(data),
            Err(error) => Self::failed(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Removal {
        id: String,
        removed: bool,
    }

    #[test]
    fn test_failed_carries_defaults() {
        let envelope: Envelope<Removal> = Envelope::failed("no such container");
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({"success": false, "id": "", "removed": false, "error": "no such container"})
        );
    }

    #[test]
    fn test_ok_has_empty_error() {
        let envelope = Envelope::ok(Removal {
            id: "abc".into(),
            removed: true,
        });
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["error"], "");
        assert_eq!(value["id"], "abc");
    }

    #[test]
    fn test_from_outcome_and_back() {
        let envelope: Envelope<Removal> = Err::<Removal, String>("gone".into()).into();
        assert!(!envelope.is_success());
        assert_eq!(envelope.into_result(), Err("gone".to_string()));

        let envelope: Envelope<Removal> = Ok::<Removal, String>(Removal::default()).into();
        assert!(envelope.is_success());
    }
}
