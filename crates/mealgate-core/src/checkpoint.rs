//! The verification checkpoint: resolve the diner, find the active shift,
//! record the dispatch and notify displays.

use std::{sync::Arc, time::Duration};

use serde::Serialize;

use crate::{
  Error, Result,
  diner::Diner,
  ledger::Ledger,
  notify::{DispatchEvent, Publisher},
  resolver::Resolver,
  shift::current_shift,
  store::{Clock, DinerStore, DirectoryProvider, DispatchStore, ShiftStore, SystemClock},
};

/// Default budget for one verification, in milliseconds; terminals need
/// sub-second answers.
pub const DEFAULT_TIMEOUT_MS: u64 = 800;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(DEFAULT_TIMEOUT_MS);

/// Outcome of a verification that did not fault: either the served diner or
/// the reason shown on the terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
  pub diner:  Option<Diner>,
  pub reason: Option<String>,
}

impl Verification {
  fn accepted(diner: Diner) -> Self { Self { diner: Some(diner), reason: None } }

  fn rejected(reason: String) -> Self { Self { diner: None, reason: Some(reason) } }

  pub fn is_accepted(&self) -> bool { self.diner.is_some() }
}

/// Terminal-facing text for a recoverable error.
pub fn rejection_reason(err: &Error) -> String {
  match err {
    Error::NotEligible => "diner not found or not eligible".into(),
    Error::DuplicateDispatch => "already has a record for the current shift and day".into(),
    Error::NoActiveShift => "outside meal hours".into(),
    other => other.to_string(),
  }
}

pub struct Checkpoint<S> {
  store:     Arc<S>,
  resolver:  Resolver<S>,
  ledger:    Ledger<S>,
  publisher: Arc<dyn Publisher>,
  clock:     Arc<dyn Clock>,
  timeout:   Duration,
}

impl<S> Checkpoint<S>
where
  S: DinerStore + ShiftStore + DispatchStore,
{
  /// A checkpoint on the system clock with no reference providers.
  pub fn new(store: Arc<S>, publisher: Arc<dyn Publisher>) -> Self {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    Self {
      resolver: Resolver::new(Arc::clone(&store), Vec::new(), Arc::clone(&clock)),
      ledger: Ledger::new(Arc::clone(&store), Arc::clone(&clock)),
      store,
      publisher,
      clock,
      timeout: DEFAULT_TIMEOUT,
    }
  }

  /// Reference providers, consulted in the given order.
  pub fn with_providers(mut self, providers: Vec<Arc<dyn DirectoryProvider>>) -> Self {
    self.resolver = Resolver::new(Arc::clone(&self.store), providers, Arc::clone(&self.clock));
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.resolver.clock = Arc::clone(&clock);
    self.ledger.clock = Arc::clone(&clock);
    self.clock = clock;
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// The ledger shared by the checkpoint and administrative callers, so both
  /// paths go through the same per-key serialization.
  pub fn ledger(&self) -> &Ledger<S> { &self.ledger }

  pub fn resolver(&self) -> &Resolver<S> { &self.resolver }

  /// Run the checkpoint flow for one presented identification number.
  ///
  /// Business rejections come back as `Ok` with a reason. Only storage
  /// faults and the timeout are returned as `Err`.
  pub async fn verify_and_dispatch(&self, identification: &str) -> Result<Verification> {
    let outcome = tokio::time::timeout(self.timeout, self.attempt(identification)).await;

    match outcome {
      Err(_) => {
        tracing::error!(timeout = ?self.timeout, "verification timed out");
        Err(Error::Timeout)
      }
      Ok(Ok(diner)) => Ok(Verification::accepted(diner)),
      Ok(Err(e)) if e.is_recoverable() => {
        tracing::info!(reason = %e, "verification rejected");
        Ok(Verification::rejected(rejection_reason(&e)))
      }
      Ok(Err(e)) => {
        tracing::error!(error = %e, "verification failed");
        Err(e)
      }
    }
  }

  async fn attempt(&self, identification: &str) -> Result<Diner> {
    let diner = self.resolver.resolve(identification).await?;

    // One shift resolution serves both the duplicate check and the insert.
    let now = self.clock.now();
    let shifts = self.store.list_shifts().await.map_err(Error::storage)?;
    let shift = current_shift(&shifts, now.time());

    if let Some(shift) = shift
      && self
        .ledger
        .has_active_dispatch(diner.id, shift.id, now.date())
        .await?
    {
      return Err(Error::DuplicateDispatch);
    }

    let dispatch = self
      .ledger
      .create_from_verification_at(diner.id, &diner.identification, shift, now)
      .await?;

    self
      .publisher
      .publish(DispatchEvent::project(&dispatch, Some(&diner), shift));

    Ok(diner)
  }
}
