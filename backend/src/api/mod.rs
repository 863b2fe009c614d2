//! HTTP API module.
//!
//! Upload/convert and download endpoints, plus the log stream the upload
//! page listens to while a conversion runs.

pub mod context;
pub mod logs;
pub mod server;
pub mod types;

pub use context::RequestContext;
pub use server::{router, start_server, AppState};
pub use types::*;
