//! Named monotonic counters used to allocate account ids.
//!
//! The happy path is a single atomic increment-and-fetch. On first use the
//! increment finds no row, so the allocator tries to create it at 1; if a
//! concurrent caller wins that race the allocator goes back to incrementing.
//! Values may have gaps after failures but are never handed out twice.

use anyhow::anyhow;
use std::{sync::Arc, time::Duration};
use tracing::{debug, instrument};

use super::error::{Error, Result};
use crate::store::{bounded, CounterStore};

/// Counter backing account ids.
pub const USER_ID_COUNTER: &str = "user_id";

const MAX_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn CounterStore>,
    timeout: Duration,
}

impl SequenceAllocator {
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Allocate the next value of `name`, starting at 1.
    ///
    /// # Errors
    /// Store failures propagate; exhausting the creation retries is internal.
    #[instrument(skip(self))]
    pub async fn next(&self, name: &str) -> Result<i64> {
        for attempt in 1..=MAX_ATTEMPTS {
            let incremented = bounded(
                self.timeout,
                "counters.increment",
                self.store.increment_counter(name),
            )
            .await?;
            if let Some(value) = incremented {
                return Ok(value);
            }

            let created = bounded(
                self.timeout,
                "counters.create",
                self.store.create_counter(name),
            )
            .await?;
            if created {
                return Ok(1);
            }
            debug!(attempt, "counter created concurrently, retrying increment");
        }

        Err(Error::Internal(anyhow!(
            "counter `{name}` could not be allocated after {MAX_ATTEMPTS} attempts"
        )))
    }
}
