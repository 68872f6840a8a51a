//! Transport layer for the CLI and the HTTP server

pub mod cli;
pub mod http;

pub use http::{router, run_http_server, AppState};
