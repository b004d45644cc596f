//! Diner directory resolution with multi-source fallback.

use std::sync::Arc;

use crate::{
  Error, Result,
  diner::{Diner, NewDiner, normalize_identification},
  store::{Clock, DinerStore, DirectoryProvider},
};

/// Resolves an identification number to a local diner, consulting the
/// configured reference providers in order when the local store has no
/// active match.
pub struct Resolver<S> {
  store:            Arc<S>,
  providers:        Vec<Arc<dyn DirectoryProvider>>,
  pub(crate) clock: Arc<dyn Clock>,
}

impl<S: DinerStore> Resolver<S> {
  pub fn new(
    store: Arc<S>,
    providers: Vec<Arc<dyn DirectoryProvider>>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    Self { store, providers, clock }
  }

  pub fn providers(&self) -> impl Iterator<Item = &str> {
    self.providers.iter().map(|p| p.name())
  }

  /// Resolve `identification` to an active diner.
  ///
  /// A provider hit provisions the diner locally, so resolving the same
  /// number again is answered by the local store. Provider failures are
  /// logged and the next provider is tried.
  pub async fn resolve(&self, identification: &str) -> Result<Diner> {
    let key = normalize_identification(identification);
    if key.is_empty() {
      return Err(Error::NotEligible);
    }

    if let Some(diner) = self
      .store
      .find_active_diner(&key)
      .await
      .map_err(Error::storage)?
    {
      tracing::debug!(diner_id = diner.id, "resolved from local directory");
      return Ok(diner);
    }

    let raw = identification.trim();
    for provider in &self.providers {
      let entry = match provider.lookup(raw).await {
        Ok(Some(entry)) => entry,
        Ok(None) => continue,
        Err(e) => {
          tracing::warn!(provider = provider.name(), error = %e, "directory provider failed");
          continue;
        }
      };

      let diner = self
        .store
        .upsert_diner(NewDiner::from_roster(entry, self.clock.now()))
        .await
        .map_err(Error::storage)?;
      tracing::info!(
        diner_id = diner.id,
        provider = provider.name(),
        "provisioned diner from reference source"
      );
      return Ok(diner);
    }

    Err(Error::NotEligible)
  }
}
