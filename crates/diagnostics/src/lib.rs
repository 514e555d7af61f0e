//! Diagnostics for the fanout workspace
//!
//! Structured logging shared by the relay library and the `fanout` binary.
//!
//! Usage:
//! - Set FANOUT_LOG=off (default) - no logs
//! - Set FANOUT_LOG=info - part uploads, chunk transitions, handoffs
//! - Set FANOUT_LOG=debug - per-read decoder and buffer detail

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable holding the log level
pub const LOG_ENV: &str = "FANOUT_LOG";

static INIT: Once = Once::new();

/// Map a `FANOUT_LOG` value to a minimum emit level.
///
/// `Ok(None)` means logging is switched off; `Err` carries the unknown value.
pub fn parse_level(value: &str) -> Result<Option<emit::Level>, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "off" => Ok(None),
        "debug" => Ok(Some(emit::Level::Debug)),
        "info" => Ok(Some(emit::Level::Info)),
        "warn" => Ok(Some(emit::Level::Warn)),
        "error" => Ok(Some(emit::Level::Error)),
        other => Err(other.to_string()),
    }
}

/// Initialize diagnostics based on the FANOUT_LOG environment variable
///
/// Call once at startup. Later calls are ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let value = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());

        let level = match parse_level(&value) {
            Ok(Some(level)) => level,
            Ok(None) => return,
            Err(unknown) => {
                // Bootstrap warning, the emitter is not installed yet
                eprintln!("Warning: Unknown {LOG_ENV} value '{unknown}', using 'info'");
                emit::Level::Info
            }
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        // The runtime lives for the rest of the process
        std::mem::forget(rt);
    });
}

// Re-export emit's macros directly rather than wrapping them in `macro_rules!`:
// emit resolves `{name}` captures with call-site hygiene, which a wrapper macro
// would hide from the caller's locals.
//
// - `info!`: operations a user follows in normal runs: part uploads, handoffs, completion
// - `debug!`: per-read and per-buffer detail
// - `warn!`: recoverable or swallowed conditions, e.g. a failed handoff trigger
// - `error!`: failures that end the current execution
pub use emit::{debug, error, info, warn};

/// Re-export the init function for convenience
pub use init_diagnostics as init;
