//! Student directory cache service and its MCP server surface
//!
//! - `student`: the upstream record shape
//! - `service`: the time-bounded in-memory cache with lookup queries
//! - `tools`: tool descriptors and dispatch for the MCP tool contract
//! - `server`: the stdio JSON-RPC server loop

pub mod server;
pub mod service;
pub mod student;
pub mod tools;

pub use server::DirectoryServer;
pub use service::{Clock, DirectoryService, SystemClock};
pub use student::Student;
pub use tools::{dispatch, tool_descriptors, STUDENT_NOT_FOUND};
