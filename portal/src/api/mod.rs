//! HTTP API module.
//!
//! The axum server, its request/response bodies and the progress log
//! streamed to browsers over SSE.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server, AppState};
pub use types::*;
