//! Tools for handling stop signals (e.g. `SIGINT`). See [polling].
//!
//! Note that enabling the handlers in [polling] will disable the default
//! stop-signal handler.

pub mod polling;

const THREAD_EXPECT_MSG: &str = "The other thread shouldn't panic.";
