//! Credential-scoped tool definition cache.
//!
//! One entry per credential, refreshed synchronously when older than the TTL.
//! Population is single-flight: concurrent lookups for the same credential
//! while no fresh entry exists trigger exactly one upstream fetch, and every
//! waiter of that flight observes the same outcome. Coordination is per-key,
//! so unrelated credentials never serialize on each other.
//!
//! A failed population is never stored. If a previous entry exists (fresh or
//! stale) it keeps being served instead, so a transient upstream outage does
//! not blank a credential's tool list.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::translate::ToolDefinition;
use crate::upstream::{Credential, UpstreamError};

/// Default entry time-to-live, in seconds.
pub const DEFAULT_TTL_SECS: u64 = 3600;

struct CacheEntry {
    tools: Arc<Vec<ToolDefinition>>,
    fetched_at: Instant,
}

#[derive(Default)]
struct SlotState {
    entry: Option<CacheEntry>,
    /// Outcome of the most recent failed population, shared with waiters that
    /// were already queued when it happened.
    last_failure: Option<(Instant, UpstreamError)>,
}

#[derive(Default)]
struct Slot {
    /// Population gate. Held across the upstream fetch, per credential.
    flight: tokio::sync::Mutex<()>,
    state: Mutex<SlotState>,
}

impl Slot {
    fn fresh_tools(&self, ttl: Duration) -> Option<Arc<Vec<ToolDefinition>>> {
        let state = self.state.lock().unwrap();
        state
            .entry
            .as_ref()
            .filter(|e| e.fetched_at.elapsed() < ttl)
            .map(|e| e.tools.clone())
    }

    fn any_tools(&self) -> Option<Arc<Vec<ToolDefinition>>> {
        let state = self.state.lock().unwrap();
        state.entry.as_ref().map(|e| e.tools.clone())
    }

    fn failure_since(&self, arrived: Instant) -> Option<UpstreamError> {
        let state = self.state.lock().unwrap();
        state
            .last_failure
            .as_ref()
            .filter(|(at, _)| *at >= arrived)
            .map(|(_, e)| e.clone())
    }

    fn store(&self, tools: Vec<ToolDefinition>) -> Arc<Vec<ToolDefinition>> {
        let tools = Arc::new(tools);
        let mut state = self.state.lock().unwrap();
        state.entry = Some(CacheEntry {
            tools: tools.clone(),
            fetched_at: Instant::now(),
        });
        state.last_failure = None;
        tools
    }

    fn record_failure(&self, error: UpstreamError) {
        let mut state = self.state.lock().unwrap();
        state.last_failure = Some((Instant::now(), error));
    }
}

/// Freshness snapshot of one cached credential, keys redacted.
#[derive(Debug, Clone, Serialize)]
pub struct CacheKeyStatus {
    pub credential: String,
    pub tool_count: usize,
    pub age_secs: u64,
    pub fresh: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub ttl_secs: u64,
    pub entries: Vec<CacheKeyStatus>,
}

/// Tool definition cache keyed by credential.
pub struct CredentialCache {
    ttl: Duration,
    slots: Mutex<HashMap<Credential, Arc<Slot>>>,
}

impl CredentialCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, credential: &Credential) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap();
        slots.entry(credential.clone()).or_default().clone()
    }

    /// Return the cached tools for a credential, populating through
    /// `populate` when absent or expired.
    ///
    /// Expired entries block on a synchronous refresh rather than serving
    /// stale data: tool definitions affect call correctness, so an
    /// upstream-removed plugin must not remain listed past the TTL window.
    pub async fn get_or_populate<F, Fut>(
        &self,
        credential: &Credential,
        populate: F,
    ) -> Result<Arc<Vec<ToolDefinition>>, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<ToolDefinition>, UpstreamError>>,
    {
        let slot = self.slot(credential);

        if let Some(tools) = slot.fresh_tools(self.ttl) {
            debug!("Cache hit for credential {}", credential.redacted());
            return Ok(tools);
        }

        let arrived = Instant::now();
        let _flight = slot.flight.lock().await;

        // Another caller may have finished the flight while we queued.
        if let Some(tools) = slot.fresh_tools(self.ttl) {
            return Ok(tools);
        }
        if let Some(error) = slot.failure_since(arrived) {
            return match slot.any_tools() {
                Some(tools) => Ok(tools),
                None => Err(error),
            };
        }

        debug!(
            "Populating tool cache for credential {}",
            credential.redacted()
        );
        match populate().await {
            Ok(tools) => Ok(slot.store(tools)),
            Err(error) => {
                slot.record_failure(error.clone());
                match slot.any_tools() {
                    Some(tools) => {
                        warn!(
                            "Refresh failed for credential {}, serving last known good \
                             ({} tools): {}",
                            credential.redacted(),
                            tools.len(),
                            error
                        );
                        Ok(tools)
                    }
                    None => Err(error),
                }
            }
        }
    }

    /// Fresh-only lookup, no population. Used by tool dispatch, which must
    /// never trigger an implicit refetch.
    pub fn lookup(&self, credential: &Credential) -> Option<Arc<Vec<ToolDefinition>>> {
        let slots = self.slots.lock().unwrap();
        slots.get(credential).and_then(|s| s.fresh_tools(self.ttl))
    }

    /// Eagerly drop one credential's entry. The next lookup behaves as a
    /// cold miss. Returns whether an entry existed.
    pub fn invalidate(&self, credential: &Credential) -> bool {
        let mut slots = self.slots.lock().unwrap();
        slots.remove(credential).is_some()
    }

    /// Drop everything.
    pub fn clear(&self) -> usize {
        let mut slots = self.slots.lock().unwrap();
        let count = slots.len();
        slots.clear();
        count
    }

    pub fn status(&self) -> CacheStatus {
        let slots = self.slots.lock().unwrap();
        let entries = slots
            .iter()
            .filter_map(|(credential, slot)| {
                let state = slot.state.lock().unwrap();
                state.entry.as_ref().map(|entry| {
                    let age = entry.fetched_at.elapsed();
                    CacheKeyStatus {
                        credential: credential.redacted(),
                        tool_count: entry.tools.len(),
                        age_secs: age.as_secs(),
                        fresh: age < self.ttl,
                    }
                })
            })
            .collect();

        CacheStatus {
            ttl_secs: self.ttl.as_secs(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CredentialCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECS))
    }
}
