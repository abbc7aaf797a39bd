use serde::Serialize;

use crate::reconstructor::RunState;

/// One record per reconstruction iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationTrace {
    pub run_id: String,
    pub iteration: usize,
    pub algorithm: &'static str,
    pub real_error: f64,
    pub fourier_error: f64,
    pub support_size: usize,
    pub state: RunState,
}

impl IterationTrace {
    #[must_use]
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}
