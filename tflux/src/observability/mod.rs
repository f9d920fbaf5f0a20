//! Logging setup and timing helpers.

mod logging;
mod timer;

pub use logging::{init_json_tracing, init_tracing, LOG_ENV};
pub use timer::SpanTimer;
