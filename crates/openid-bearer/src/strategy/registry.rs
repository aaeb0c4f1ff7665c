//! Named strategy registry

use super::{Outcome, RequestRef, Strategy};
use crate::error::RegistryError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Strategies registered under integrator-chosen names.
///
/// [`run`](Self::run) evaluates a list of names the way a Warden-style host
/// does: strategies are tried in order, those whose `is_valid` is false are
/// skipped, and the first applicable strategy's outcome ends the run.
pub struct StrategyRegistry<P> {
    strategies: HashMap<String, Arc<dyn Strategy<Principal = P>>>,
}

impl<P: Send + 'static> StrategyRegistry<P> {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Register `strategy` as `name`
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if `name` is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        strategy: Arc<dyn Strategy<Principal = P>>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.strategies.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        debug!(strategy = %name, "Registered bearer strategy");
        self.strategies.insert(name, strategy);
        Ok(())
    }

    /// The strategy registered as `name`
    pub fn get(&self, name: &str) -> Option<Arc<dyn Strategy<Principal = P>>> {
        self.strategies.get(name).cloned()
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Registered names, in no particular order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    /// Run the strategies named in `names` on `request`
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unknown`] before running anything if a name is
    /// not registered.
    pub async fn run(&self, names: &[&str], request: &RequestRef) -> Result<Outcome<P>, RegistryError> {
        let strategies = names
            .iter()
            .map(|name| {
                self.get(name)
                    .map(|strategy| (*name, strategy))
                    .ok_or_else(|| RegistryError::Unknown((*name).to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (name, strategy) in strategies {
            if !strategy.is_valid(request).await {
                debug!(strategy = name, "Strategy does not apply");
                continue;
            }

            let outcome = strategy.authenticate(request).await;
            if outcome.is_decline() {
                continue;
            }
            debug!(
                strategy = name,
                success = outcome.is_success(),
                "Strategy decided request"
            );
            return Ok(outcome);
        }

        Ok(Outcome::Decline)
    }
}

impl<P: Send + 'static> Default for StrategyRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for StrategyRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}
