//! Structured logging for columnload.
//!
//! Every event goes to the `columnload` target through `tracing` and carries
//! two fixed fields ahead of any others:
//!
//! - `component`: the subsystem emitting it (`"load"`, `"pipeline"`,
//!   `"query"`, `"run"`)
//! - `event`: a snake_case name such as `chunk_load_failed`
//!
//! The macros take both as leading literals so an event cannot be logged
//! without them. Remaining arguments are ordinary `tracing` fields (`%` for
//! Display, `?` for Debug).
//!
//! Nothing here installs a subscriber; the `columnload` binary sets up a
//! `tracing_subscriber` formatter filtered by `RUST_LOG` or `--log-level`.
//! Rows are never logged individually and per-chunk events stay at debug.

/// Target for all columnload log events.
pub(crate) const COLUMNLOAD_TARGET: &str = "columnload";

/// Info-level event.
///
/// ```ignore
/// log_info!("load", "csv_file_read", path = %path.display(), bytes = len);
/// ```
macro_rules! log_info {
    ($component:literal, $event:literal $($field:tt)*) => {
        ::tracing::info!(
            target: $crate::observability::COLUMNLOAD_TARGET,
            component = $component,
            event = $event
            $($field)*
        )
    };
}

macro_rules! log_debug {
    ($component:literal, $event:literal $($field:tt)*) => {
        ::tracing::debug!(
            target: $crate::observability::COLUMNLOAD_TARGET,
            component = $component,
            event = $event
            $($field)*
        )
    };
}

macro_rules! log_warn {
    ($component:literal, $event:literal $($field:tt)*) => {
        ::tracing::warn!(
            target: $crate::observability::COLUMNLOAD_TARGET,
            component = $component,
            event = $event
            $($field)*
        )
    };
}

/// Error-level event; used for failures that skip a file or a unit of work.
macro_rules! log_error {
    ($component:literal, $event:literal $($field:tt)*) => {
        ::tracing::error!(
            target: $crate::observability::COLUMNLOAD_TARGET,
            component = $component,
            event = $event
            $($field)*
        )
    };
}

pub(crate) use {log_debug, log_error, log_info, log_warn};
