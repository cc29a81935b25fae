//! Defines [eprintln_and_exit], used by binaries to bail out with a message.

/// The equivalent to calling [eprintln], then calling [std::process::exit]
/// with an exit code of `1`.
///
/// Useful for exiting gracefully with an error message from `main`.
#[macro_export]
macro_rules! eprintln_and_exit {
    ($($arg:tt)*) => {{
        ::std::eprintln!($($arg)*);
        ::std::process::exit(1);
    }};
}
