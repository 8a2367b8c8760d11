//! Tool contract for the student directory
//!
//! Defines the static list of tools the directory server advertises over
//! `tools/list` and the dispatcher that maps a `tools/call` invocation onto
//! [`DirectoryService`] lookups.
//!
//! Every dispatch returns a plain UTF-8 string: a JSON payload for hits, the
//! literal `Student not found` for single-record misses, and a fixed
//! `{"error": "..."}` object for missing arguments or unknown tools. Errors
//! are never propagated to the JSON-RPC layer.

use crate::directory::service::DirectoryService;
use crate::mcp::types::McpTool;

/// Sentinel returned when a single-record lookup finds nothing.
pub const STUDENT_NOT_FOUND: &str = "Student not found";

fn string_arg_schema(arg: &str, description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            arg: { "type": "string", "description": description }
        },
        "required": [arg]
    })
}

fn no_arg_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// The static tool list advertised by the directory server.
pub fn tool_descriptors() -> Vec<McpTool> {
    vec![
        McpTool {
            name: "get_students".to_string(),
            description: Some("Get a list of students and return as JSON array".to_string()),
            input_schema: no_arg_schema(),
        },
        McpTool {
            name: "get_student_by_name".to_string(),
            description: Some("Get a student by name and return as JSON".to_string()),
            input_schema: string_arg_schema("name", "The name of the student to get details for"),
        },
        McpTool {
            name: "get_student_by_id".to_string(),
            description: Some("Get a student by ID and return as JSON".to_string()),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "id": {
                        "type": "integer",
                        "description": "The ID of the student to get details for"
                    }
                },
                "required": ["id"]
            }),
        },
        McpTool {
            name: "get_students_by_school".to_string(),
            description: Some("Get students by school and return as JSON".to_string()),
            input_schema: string_arg_schema(
                "school",
                "The name of the school to filter students by",
            ),
        },
        McpTool {
            name: "get_students_by_last_name".to_string(),
            description: Some("Get students by last name and return as JSON".to_string()),
            input_schema: string_arg_schema("last_name", "The last name of the student to filter by"),
        },
        McpTool {
            name: "get_students_by_first_name".to_string(),
            description: Some("Get students by first name and return as JSON".to_string()),
            input_schema: string_arg_schema(
                "first_name",
                "The first name of the student to filter by",
            ),
        },
        McpTool {
            name: "get_student_count".to_string(),
            description: Some("Get count of total students".to_string()),
            input_schema: no_arg_schema(),
        },
    ]
}

fn error_payload(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

fn json_or_error<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => error_payload(&format!("serialization failed: {e}")),
    }
}

fn string_arg(args: &serde_json::Value, key: &str) -> Result<String, String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| error_payload(&format!("missing required argument: {key}")))
}

/// Dispatch a tool invocation against the directory service.
///
/// # Arguments
///
/// * `service` - The directory service backing the lookups.
/// * `name` - The tool name as advertised by [`tool_descriptors`].
/// * `args` - The JSON arguments object from the `tools/call` request.
pub async fn dispatch(service: &DirectoryService, name: &str, args: &serde_json::Value) -> String {
    tracing::info!(tool = name, "directory tool called");
    match name {
        "get_students" => json_or_error(&service.get_all().await),
        "get_student_by_name" => {
            let student_name = match string_arg(args, "name") {
                Ok(v) => v,
                Err(payload) => return payload,
            };
            match service.get_by_full_name(&student_name).await {
                Some(student) => json_or_error(&student),
                None => STUDENT_NOT_FOUND.to_string(),
            }
        }
        "get_student_by_id" => {
            let Some(id) = args.get("id").and_then(|v| v.as_i64()) else {
                return error_payload("missing required argument: id");
            };
            match service.get_by_id(id).await {
                Some(student) => json_or_error(&student),
                None => STUDENT_NOT_FOUND.to_string(),
            }
        }
        "get_students_by_school" => {
            let school = match string_arg(args, "school") {
                Ok(v) => v,
                Err(payload) => return payload,
            };
            json_or_error(&service.get_by_school(&school).await)
        }
        "get_students_by_last_name" => {
            let last_name = match string_arg(args, "last_name") {
                Ok(v) => v,
                Err(payload) => return payload,
            };
            json_or_error(&service.get_by_last_name(&last_name).await)
        }
        "get_students_by_first_name" => {
            let first_name = match string_arg(args, "first_name") {
                Ok(v) => v,
                Err(payload) => return payload,
            };
            json_or_error(&service.get_by_first_name(&first_name).await)
        }
        "get_student_count" => service.count().await.to_string(),
        other => {
            tracing::warn!(tool = other, "unknown directory tool requested");
            error_payload(&format!("unknown tool: {other}"))
        }
    }
}
