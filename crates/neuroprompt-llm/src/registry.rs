//! Provider registry with self-healing availability tracking
//!
//! The registry is the one piece of mutable state shared by every concurrent
//! completion. All reads and writes go through a single mutex so that a
//! selection never observes a half-applied reset.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::LlmError;

/// Availability of one provider at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub id: String,
    pub available: bool,
}

/// Ordered providers: the primary first, then fallbacks in priority order.
///
/// Membership and order are fixed at construction; only the availability flags
/// change afterwards.
#[derive(Debug)]
pub struct ProviderRegistry {
    providers: Mutex<Vec<ProviderStatus>>,
}

impl ProviderRegistry {
    /// Build a registry, every provider starting available.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if an identifier is empty or appears
    /// more than once.
    pub fn new(
        primary: impl Into<String>,
        fallbacks: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, LlmError> {
        let ids: Vec<String> = std::iter::once(primary.into())
            .chain(fallbacks.into_iter().map(Into::into))
            .collect();

        let mut seen = HashSet::new();
        for id in &ids {
            if id.trim().is_empty() {
                return Err(LlmError::Misconfiguration(
                    "provider identifiers must not be empty".to_string(),
                ));
            }
            if !seen.insert(id.as_str()) {
                return Err(LlmError::Misconfiguration(format!(
                    "provider '{id}' is registered more than once"
                )));
            }
        }

        let providers = ids
            .into_iter()
            .map(|id| ProviderStatus {
                id,
                available: true,
            })
            .collect();

        Ok(Self {
            providers: Mutex::new(providers),
        })
    }

    /// Build a registry from an ordered id list whose first entry is the primary.
    ///
    /// # Errors
    ///
    /// Same as [`ProviderRegistry::new`], plus an empty list.
    pub fn from_ids(ids: &[String]) -> Result<Self, LlmError> {
        let (primary, fallbacks) = ids.split_first().ok_or_else(|| {
            LlmError::Misconfiguration("at least one provider is required".to_string())
        })?;
        Self::new(primary.clone(), fallbacks.iter().cloned())
    }

    // A panic while holding the lock cannot leave the flags inconsistent, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<ProviderStatus>> {
        self.providers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Select the provider for the next attempt.
    ///
    /// Returns the primary if available, else the first available fallback in
    /// declared order. When none is available every provider is reset to
    /// available and the primary is returned.
    pub fn available_provider(&self) -> String {
        let mut providers = self.lock();

        if let Some(p) = providers.iter().find(|p| p.available) {
            return p.id.clone();
        }

        info!(
            providers = providers.len(),
            "All providers unavailable, resetting availability and retrying the primary"
        );
        for p in providers.iter_mut() {
            p.available = true;
        }
        providers[0].id.clone()
    }

    /// Mark a provider unavailable. Returns false for an unknown identifier.
    pub fn mark_unavailable(&self, id: &str) -> bool {
        let mut providers = self.lock();
        match providers.iter_mut().find(|p| p.id == id) {
            Some(p) => {
                p.available = false;
                debug!(provider = %id, "Provider marked unavailable");
                true
            }
            None => {
                debug!(provider = %id, "Ignoring unknown provider");
                false
            }
        }
    }

    /// Mark every provider available.
    pub fn mark_all_available(&self) {
        for p in self.lock().iter_mut() {
            p.available = true;
        }
    }

    /// Ordered `(id, available)` view for diagnostics
    #[must_use]
    pub fn snapshot(&self) -> Vec<ProviderStatus> {
        self.lock().clone()
    }

    /// Availability of one provider, `None` if it is not registered
    #[must_use]
    pub fn is_available(&self, id: &str) -> Option<bool> {
        self.lock().iter().find(|p| p.id == id).map(|p| p.available)
    }

    #[must_use]
    pub fn primary(&self) -> String {
        self.lock()[0].id.clone()
    }

    /// Provider identifiers in priority order
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.lock().iter().map(|p| p.id.clone()).collect()
    }

    /// Number of providers, primary included. Never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn abc() -> ProviderRegistry {
        ProviderRegistry::new("A", ["B", "C"]).unwrap()
    }

    #[test]
    fn test_primary_served_while_available() {
        let registry = abc();
        assert_eq!(registry.available_provider(), "A");
        assert_eq!(registry.available_provider(), "A");
    }

    #[test]
    fn test_fallbacks_in_declared_order() {
        let registry = abc();
        registry.mark_unavailable("A");
        assert_eq!(registry.available_provider(), "B");
        registry.mark_unavailable("B");
        assert_eq!(registry.available_provider(), "C");
    }

    #[test]
    fn test_recovered_primary_wins_again() {
        let registry = abc();
        registry.mark_unavailable("A");
        registry.mark_unavailable("B");
        registry.mark_all_available();
        assert_eq!(registry.available_provider(), "A");
    }

    #[test]
    fn test_exhaustion_resets_and_returns_primary() {
        let registry = abc();
        for id in ["A", "B", "C"] {
            registry.mark_unavailable(id);
        }
        assert_eq!(registry.is_available("C"), Some(false));

        assert_eq!(registry.available_provider(), "A");
        assert!(registry.snapshot().iter().all(|p| p.available));
    }

    #[test]
    fn test_unknown_provider_is_ignored() {
        let registry = abc();
        assert!(!registry.mark_unavailable("Z"));
        assert_eq!(registry.is_available("Z"), None);
        assert!(registry.snapshot().iter().all(|p| p.available));
    }

    #[test]
    fn test_snapshot_keeps_declared_order() {
        let registry = abc();
        registry.mark_unavailable("B");
        assert_eq!(
            registry.snapshot(),
            vec![
                ProviderStatus { id: "A".into(), available: true },
                ProviderStatus { id: "B".into(), available: false },
                ProviderStatus { id: "C".into(), available: true },
            ]
        );
        assert_eq!(registry.ids(), vec!["A", "B", "C"]);
        assert_eq!(registry.primary(), "A");
    }

    #[test]
    fn test_single_provider_registry() {
        let registry = ProviderRegistry::new("solo", Vec::<String>::new()).unwrap();
        assert_eq!(registry.len(), 1);
        registry.mark_unavailable("solo");
        assert_eq!(registry.available_provider(), "solo");
        assert_eq!(registry.is_available("solo"), Some(true));
    }

    #[test]
    fn test_construction_rejects_bad_ids() {
        assert!(ProviderRegistry::new("A", ["A"]).is_err());
        assert!(ProviderRegistry::new("", ["B"]).is_err());
        assert!(ProviderRegistry::from_ids(&[]).is_err());

        let registry = ProviderRegistry::from_ids(&["A".to_string(), "B".to_string()]).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_marking_is_serialized() {
        let registry = std::sync::Arc::new(
            ProviderRegistry::new("p0", (1..16).map(|i| format!("p{i}"))).unwrap(),
        );

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = std::sync::Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.mark_unavailable(&format!("p{i}"));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert!(registry.snapshot().iter().all(|p| !p.available));
        assert_eq!(registry.available_provider(), "p0");
        assert!(registry.snapshot().iter().all(|p| p.available));
    }

    proptest! {
        #[test]
        fn prop_selection_is_first_available_or_reset(
            n_fallbacks in 0usize..6,
            down in proptest::collection::vec(any::<bool>(), 7),
        ) {
            let fallbacks: Vec<String> = (1..=n_fallbacks).map(|i| format!("F{i}")).collect();
            let registry = ProviderRegistry::new("P", fallbacks.clone()).unwrap();
            let ids = registry.ids();

            for (id, is_down) in ids.iter().zip(&down) {
                if *is_down {
                    registry.mark_unavailable(id);
                }
            }

            let expected = ids
                .iter()
                .zip(&down)
                .find(|(_, is_down)| !**is_down)
                .map(|(id, _)| id.clone());

            let selected = registry.available_provider();
            match expected {
                Some(id) => prop_assert_eq!(selected, id),
                None => {
                    prop_assert_eq!(selected, "P");
                    prop_assert!(registry.snapshot().iter().all(|p| p.available));
                }
            }
        }
    }
}
