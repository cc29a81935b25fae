//! Contains tools for debug-mode logging.
//!
//! Logging cannot be enabled when `cfg!(debug_assertions)` is false, otherwise
//! it's enabled by default. Every log line carries the call site, the time,
//! and the command line that started the process (see [where_and_when]).

pub mod panic_on_errors;

use std::panic::Location;
#[cfg(debug_assertions)]
use std::sync::atomic::{AtomicBool, Ordering};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Shared body of the public logging macros. Not meant to be used directly.
#[doc(hidden)]
#[macro_export]
macro_rules! __debug_log_line {
    ($stream:ident, $print:ident, $level:literal, $level_color:literal, $($arg:tt)*) => {{
        let is_terminal = ::std::io::IsTerminal::is_terminal(&::std::io::$stream());
        let (blue, level_color, reset_color) = if is_terminal {
            ("\x1b[34m", $level_color, "\x1b[0m")
        } else {
            ("", "", "")
        };

        let where_and_when = $crate::debug_log::where_and_when(blue, reset_color);

        ::std::$print!(
            "{blue}DEBUG LOG{reset_color} [{level_color}{}{reset_color}]: {}\n{where_and_when}",
            $level,
            ::std::format!($($arg)*),
        );
    }};
}

/// Log some info to stdout if both `cfg!(debug_assertions)` and [enabled] are
/// true.
#[macro_export]
macro_rules! debug_log_info {
    ($($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        if $crate::debug_log::enabled() {
            $crate::__debug_log_line!(stdout, println, "INFO", "\x1b[35m", $($arg)*);
        }
    }};
}

/// Log a warning to stderr if both `cfg!(debug_assertions)` and [enabled] are
/// true.
#[macro_export]
macro_rules! debug_log_warning {
    ($($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        if $crate::debug_log::enabled() {
            $crate::__debug_log_line!(stderr, eprintln, "WARNING", "\x1b[33m", $($arg)*);
        }
    }};
}

/// Log an error to stderr if both `cfg!(debug_assertions)` and [enabled] are
/// true. Panics afterwards if [panic_on_errors::enabled] is true.
#[macro_export]
macro_rules! debug_log_error {
    ($($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        if $crate::debug_log::enabled() {
            $crate::__debug_log_line!(stderr, eprintln, "ERROR", "\x1b[31m", $($arg)*);

            if $crate::debug_log::panic_on_errors::enabled() {
                panic!("Panicking on error logging enabled.");
            }
        }
    }};
}

/// Whether logging is enabled or not.
///
/// Logging cannot be enabled when `cfg!(debug_assertions)` is false, otherwise
/// it's enabled by default.
#[inline(always)]
pub fn enabled() -> bool {
    #[cfg(not(debug_assertions))]
    #[inline(always)]
    fn enabled_impl() -> bool {
        false
    }

    #[cfg(debug_assertions)]
    #[inline(always)]
    fn enabled_impl() -> bool {
        ENABLED.load(Ordering::Relaxed)
    }

    enabled_impl()
}

/// Disable logging.
#[inline(always)]
pub fn disable() {
    #[cfg(debug_assertions)]
    ENABLED.store(false, Ordering::Relaxed);
}

/// Enable logging.
///
/// Trying to manually enable logging when `cfg!(debug_assertions)` is false
/// will result in the program panicking.
#[inline(always)]
pub fn enable() {
    #[cfg(not(debug_assertions))]
    panic!("Debug logging cannot be enabled.");

    #[cfg(debug_assertions)]
    ENABLED.store(true, Ordering::Relaxed);
}

/// The location of the caller, the time this was called, and the executable
/// (argv), all as strings.
///
/// This function gets called by the debug log macros (e.g. [debug_log_info])
/// and generally shouldn't be called directly.
#[track_caller]
pub fn where_and_when(color: &str, reset_color: &str) -> String {
    let loc = Location::caller();
    let where_ = format!("{}:{}:{}", loc.file(), loc.line(), loc.column());

    let when = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|e| format!("Unknown time: {e}"));

    let exec = std::env::args().collect::<Vec<_>>().join(" ");

    format!(
        "\tWhere: {color}{where_}{reset_color}\n\
         \tTime:  {color}{when}{reset_color}\n\
         \tExec.: {color}{exec}{reset_color}"
    )
}

#[cfg(debug_assertions)]
static ENABLED: AtomicBool = AtomicBool::new(true);
