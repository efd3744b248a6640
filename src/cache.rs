//! WSDL acquisition with in-flight deduplication.
//!
//! At most one fetch runs per cache key; concurrent requesters block on the
//! same slot and all receive the same outcome. The slot is cleared once the
//! fetch completes, success or failure, so a later call can retry. Owned by
//! the client instance rather than being process-wide state.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use tracing::debug;

use crate::error::Error;

type FetchResult = Result<String, Arc<Error>>;

#[derive(Default)]
struct InFlight {
    outcome: Mutex<Option<FetchResult>>,
    ready: Condvar,
}

#[derive(Default)]
pub struct WsdlCache {
    slots: Mutex<HashMap<String, Arc<InFlight>>>,
}

impl WsdlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the cache key for a (host, wsdl path) pair.
    pub fn key(host: &str, wsdl_path: &str) -> String {
        format!("{}{}", host, wsdl_path)
            .chars()
            .filter(|character| character.is_ascii_alphanumeric())
            .collect()
    }

    /// Fetch the WSDL text for a key, deduplicating concurrent requests.
    ///
    /// The first requester runs `fetch`; everyone arriving while it is in
    /// flight blocks and receives the same result.
    pub fn fetch<F>(&self, key: &str, fetch: F) -> Result<String, Error>
    where
        F: FnOnce() -> Result<String, Error>,
    {
        let (slot, leader) = {
            let mut slots = self.slots.lock().unwrap();

            match slots.get(key) {
                Some(slot) => (Arc::clone(slot), false),
                None => {
                    let slot = Arc::new(InFlight::default());
                    slots.insert(key.to_owned(), Arc::clone(&slot));
                    (slot, true)
                }
            }
        };

        if leader {
            debug!(key, "fetching wsdl");
            let result = fetch().map_err(Arc::new);

            *slot.outcome.lock().unwrap() = Some(result.clone());
            slot.ready.notify_all();

            self.slots.lock().unwrap().remove(key);

            result.map_err(Error::FetchFailed)
        } else {
            debug!(key, "awaiting in-flight wsdl fetch");
            let mut outcome = slot.outcome.lock().unwrap();
            while outcome.is_none() {
                outcome = slot.ready.wait(outcome).unwrap();
            }

            outcome
                .clone()
                .expect("outcome is set before waiters are notified")
                .map_err(Error::FetchFailed)
        }
    }
}
