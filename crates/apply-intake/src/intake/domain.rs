use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Identifier assigned by the storage layer when an application is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub i32);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw form payload as posted by the client, before any checks run.
///
/// Text fields only accept JSON strings; any other JSON value counts as absent so
/// the validation step reports it instead of the body failing to parse. `age` is
/// kept as an arbitrary JSON value and coerced during validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub gender: Option<String>,
    #[serde(default)]
    pub age: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub current_occupation: Option<String>,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => Some(text),
        _ => None,
    })
}

/// A validated, normalized application ready for persistence.
///
/// Only `Application::from_submission` builds one outside this crate, so every
/// instance has passed the intake constraints. Fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Application {
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) gender: String,
    pub(crate) age: i32,
    pub(crate) current_occupation: String,
    pub(crate) ip_address: Option<String>,
}

impl Application {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn gender(&self) -> &str {
        &self.gender
    }

    pub fn age(&self) -> i32 {
        self.age
    }

    pub fn current_occupation(&self) -> &str {
        &self.current_occupation
    }

    /// Client address recorded for the submission, if one was known.
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }
}
