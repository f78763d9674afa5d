use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

/// A registered IDE: where the proxy should dial to hand off a routed
/// session, plus the opaque multi-session hint from `-m`.
#[derive(Debug, Clone)]
pub struct IdeRegistration {
    pub key: String,
    pub endpoint: SocketAddr,
    pub multi: Option<String>,
}

/// Shared map from IDE key to registration. One instance is handed to both
/// listeners; it is never implicitly global.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Mutex<HashMap<String, IdeRegistration>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts `key` if absent. Returns the key on success, `None` on collision.
    pub fn add(&self, key: &str, endpoint: SocketAddr, multi: Option<String>) -> Option<String> {
        let mut entries = self.entries.lock().expect("registry mutex poisoned");
        if entries.contains_key(key) {
            return None;
        }
        entries.insert(
            key.to_string(),
            IdeRegistration {
                key: key.to_string(),
                endpoint,
                multi,
            },
        );
        Some(key.to_string())
    }

    /// Removes `key` if present. Returns the removed key, else `None`.
    pub fn remove(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().expect("registry mutex poisoned");
        entries.remove(key).map(|reg| reg.key)
    }

    pub fn lookup(&self, key: &str) -> Option<IdeRegistration> {
        let entries = self.entries.lock().expect("registry mutex poisoned");
        entries.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:9010".parse().unwrap()
    }

    #[test]
    fn add_then_lookup_round_trips() {
        let reg = Registry::new();
        assert_eq!(reg.add("alice", addr(), None), Some("alice".to_string()));
        let found = reg.lookup("alice").unwrap();
        assert_eq!(found.key, "alice");
        assert_eq!(found.endpoint, addr());
    }

    #[test]
    fn add_collision_returns_none() {
        let reg = Registry::new();
        assert!(reg.add("dave", addr(), None).is_some());
        assert!(reg.add("dave", addr(), None).is_none());
    }

    #[test]
    fn remove_unregisters() {
        let reg = Registry::new();
        reg.add("dave", addr(), None);
        assert_eq!(reg.remove("dave"), Some("dave".to_string()));
        assert!(reg.lookup("dave").is_none());
    }

    #[test]
    fn init_then_stop_restores_prior_state() {
        let reg = Registry::new();
        assert!(reg.lookup("alice").is_none());
        reg.add("alice", addr(), None);
        reg.remove("alice");
        assert!(reg.lookup("alice").is_none());
    }

    #[test]
    fn remove_missing_key_is_none() {
        let reg = Registry::new();
        assert!(reg.remove("ghost").is_none());
    }

    #[test]
    fn dial_failure_eviction_allows_reregistration() {
        let reg = Registry::new();
        reg.add("carol", addr(), None);
        // simulate a session evicting a stale registration after a failed dial
        reg.remove("carol");
        assert!(reg.add("carol", addr(), None).is_some());
    }
}
