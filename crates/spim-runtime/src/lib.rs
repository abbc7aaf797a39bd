#![forbid(unsafe_code)]

//! Shared runtime pieces for the spimage workspace.
//!
//! ## Module layout
//!
//! | Module   | Contents                                                |
//! |----------|---------------------------------------------------------|
//! | `mode`   | [`RuntimeMode`] enum (Strict / Hardened)                |
//! | `cancel` | [`CancellationToken`] polled at iteration boundaries    |
//!
//! The crate root also carries the structured JSON-line log entry used by
//! every test suite and the tolerance assertions shared across crates.

pub mod cancel;
pub mod mode;

pub use cancel::CancellationToken;
pub use mode::RuntimeMode;

use std::time::{SystemTime, UNIX_EPOCH};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
#[must_use]
pub fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

/// One JSON line per test outcome, so runs on different machines can be
/// diffed by seed and grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestLogEntry {
    pub test_id: String,
    pub timestamp_ms: u64,
    pub level: TestLogLevel,
    pub module: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Grid the test ran on, e.g. `[32x32]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RuntimeMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TestResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestLogLevel {
    Debug,
    Info,
    Warn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    Pass,
    Fail,
}

impl TestResult {
    #[must_use]
    pub fn from_pass(pass: bool) -> Self {
        if pass { Self::Pass } else { Self::Fail }
    }
}

impl TestLogEntry {
    #[must_use]
    pub fn new(
        test_id: impl Into<String>,
        module: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            test_id: test_id.into(),
            timestamp_ms: now_unix_ms(),
            level: TestLogLevel::Info,
            module: module.into(),
            message: message.into(),
            seed: None,
            grid: None,
            mode: None,
            result: None,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: TestLogLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_result(mut self, result: TestResult) -> Self {
        self.result = Some(result);
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn with_grid(mut self, grid: impl ToString) -> Self {
        self.grid = Some(grid.to_string());
        self
    }

    #[must_use]
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// `|actual - expected| <= atol + rtol * |expected|`.
#[must_use]
pub fn within_tolerance(actual: f64, expected: f64, atol: f64, rtol: f64) -> bool {
    (actual - expected).abs() <= atol + rtol * expected.abs()
}

pub fn assert_close(actual: f64, expected: f64, atol: f64, rtol: f64) {
    assert!(
        within_tolerance(actual, expected, atol, rtol),
        "assert_close failed: actual={actual} expected={expected} (atol={atol}, rtol={rtol})"
    );
}

/// Element-wise [`assert_close`] on complex samples, measured by `|a - e|`.
pub fn assert_close_complex(actual: &[Complex64], expected: &[Complex64], atol: f64, rtol: f64) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "assert_close_complex: length mismatch"
    );
    for (idx, (a, e)) in actual.iter().zip(expected).enumerate() {
        let diff = (a - e).norm();
        assert!(
            diff <= atol + rtol * e.norm(),
            "assert_close_complex[{idx}]: actual={a} expected={e} diff={diff}"
        );
    }
}
