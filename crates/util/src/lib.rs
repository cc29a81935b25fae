//! Small cross-cutting tools shared by the `media` and `viewer` crates:
//! debug-mode logging, JSON-backed saved files, and stop-signal polling.

pub mod debug_log;
pub mod eprint_and_exit;
pub mod saved_file;
pub mod stop_signals;
