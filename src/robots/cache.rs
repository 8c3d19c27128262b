//! Run-scoped robots.txt caching
//!
//! Holds parsed rules per origin, the address each host resolved to, and the
//! set of hosts that failed to resolve. All are LRU-bounded; an evicted entry
//! is simply fetched or resolved again.

use super::RobotsRules;
use lru::LruCache;
use parking_lot::Mutex;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Cached robots rules and bad hosts for one crawl run
#[derive(Debug)]
pub struct RobotsCache {
    rules: Mutex<LruCache<String, Arc<RobotsRules>>>,
    bad_hosts: Mutex<LruCache<String, ()>>,
    resolved: Mutex<LruCache<String, IpAddr>>,
}

impl RobotsCache {
    /// Creates a cache remembering at most `capacity` origins, addresses and
    /// bad hosts each
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            rules: Mutex::new(LruCache::new(capacity)),
            bad_hosts: Mutex::new(LruCache::new(capacity)),
            resolved: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the cached rules for an origin
    pub fn get(&self, origin: &str) -> Option<Arc<RobotsRules>> {
        self.rules.lock().get(origin).cloned()
    }

    /// Caches rules for an origin, returning the shared copy
    pub fn insert(&self, origin: &str, rules: RobotsRules) -> Arc<RobotsRules> {
        let rules = Arc::new(rules);
        self.rules.lock().put(origin.to_string(), Arc::clone(&rules));
        rules
    }

    pub fn is_bad_host(&self, host: &str) -> bool {
        self.bad_hosts.lock().get(host).is_some()
    }

    /// Remembers a host whose resolution failed
    pub fn mark_bad_host(&self, host: &str) {
        self.bad_hosts.lock().put(host.to_string(), ());
    }

    /// Address the host resolved to earlier in the run
    pub fn resolved_address(&self, host: &str) -> Option<IpAddr> {
        self.resolved.lock().get(host).copied()
    }

    /// Pins a host to the address it first resolved to
    pub fn remember_address(&self, host: &str, addr: IpAddr) {
        self.resolved.lock().put(host.to_string(), addr);
    }

    /// Number of origins with cached rules
    pub fn len(&self) -> usize {
        self.rules.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bad_host_count(&self) -> usize {
        self.bad_hosts.lock().len()
    }
}
