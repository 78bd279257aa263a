// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Facilities intended for the test suite. These should not be used in
//! production code.

use slog::o;
use slog::Drain;
use slog::Logger;

/// A logger scoped to a single test.
///
/// Output goes through [`slog_term::TestStdoutWriter`], so it is captured by
/// the test harness and only shown for failing tests.
pub struct LogContext {
    pub test_name: String,
    pub log: Logger,
}

impl LogContext {
    pub fn new(test_name: &str) -> LogContext {
        let decorator =
            slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let log = Logger::root(drain, o!("test_name" => test_name.to_string()));
        LogContext { test_name: test_name.to_string(), log }
    }

    /// Mark the test as having passed.
    ///
    /// There are no log files to remove; this exists so tests read the same
    /// whether or not they keep artifacts around.
    pub fn cleanup_successful(self) {
        slog::debug!(self.log, "test complete"; "test_name" => &self.test_name);
    }
}

/// Set up a [`LogContext`] appropriate for a test named `test_name`.
pub fn test_setup_log(test_name: &str) -> LogContext {
    LogContext::new(test_name)
}
