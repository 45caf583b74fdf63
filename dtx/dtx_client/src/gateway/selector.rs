use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Result, TransactionError};

/// Round-robin choice among coordinator endpoints.
#[derive(Debug)]
pub struct EndpointSelector {
    endpoints: Vec<String>,
    cursor: AtomicUsize,
}

impl EndpointSelector {
    /// Build a selector. Trailing slashes are stripped so paths can be appended.
    pub fn new(endpoints: Vec<String>) -> Result<Self> {
        let endpoints: Vec<String> = endpoints
            .into_iter()
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .collect();

        if endpoints.is_empty() {
            return Err(TransactionError::Config(
                "endpoint selector needs at least one endpoint".to_string(),
            ));
        }

        Ok(EndpointSelector {
            endpoints,
            cursor: AtomicUsize::new(0),
        })
    }

    /// The next endpoint in rotation.
    pub fn next(&self) -> &str {
        &self.endpoints[self.next_index()]
    }

    /// Position of the next endpoint in rotation, for callers keeping one
    /// connection per endpoint.
    pub fn next_index(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed) % self.endpoints.len()
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
