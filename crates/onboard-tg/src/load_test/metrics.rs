use crate::prelude::*;
use crate::util::DynError;
use std::collections::BTreeMap;
use std::time::Duration;

const MAX_ERROR_TYPE_LEN: usize = 80;

/// Outcomes of the processed updates collected from all the workers
#[derive(Debug, Default)]
pub(crate) struct LoadTestMetrics {
    pub(crate) successful: u64,
    pub(crate) failed: u64,
    pub(crate) latencies: Vec<Duration>,

    /// Number of errors per truncated error message without the error id
    pub(crate) error_types: BTreeMap<String, u64>,

    /// Full debug representation of the first error
    pub(crate) first_error: Option<String>,
}

impl LoadTestMetrics {
    pub(crate) fn total(&self) -> u64 {
        self.successful + self.failed
    }

    pub(crate) fn record_success(&mut self, latency: Duration) {
        self.successful += 1;
        self.latencies.push(latency);
    }

    pub(crate) fn record_error(&mut self, latency: Duration, err: &DynError) {
        self.failed += 1;
        self.latencies.push(latency);

        // Our own errors carry a unique id in their `Display`
        let error_type = match err.downcast_ref::<crate::Error>() {
            Some(err) => err.kind().to_string(),
            None => err.to_string(),
        };
        let error_type = error_type.truncate_chars(MAX_ERROR_TYPE_LEN);
        *self.error_types.entry(error_type.to_owned()).or_default() += 1;

        if self.first_error.is_none() {
            self.first_error = Some(format!("{err:?}"));
        }
    }
}
