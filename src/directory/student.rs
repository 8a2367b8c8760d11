//! Student directory record

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single record from the upstream student directory.
///
/// The four well-known fields are deserialized explicitly; any additional
/// fields the upstream API returns are captured in `extra` and passed
/// through verbatim when the record is re-serialized for tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Upstream numeric identifier.
    #[serde(default)]
    pub student_id: i64,
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// School the student is enrolled at.
    #[serde(default)]
    pub school: String,
    /// Opaque additional upstream fields, preserved as-is.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Student {
    /// Convenience constructor used throughout the tests.
    pub fn new(student_id: i64, first_name: &str, last_name: &str, school: &str) -> Self {
        Self {
            student_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            school: school.to_string(),
            extra: HashMap::new(),
        }
    }
}
