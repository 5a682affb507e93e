//! Async dialogue controller.

use super::event::DialogueEvent;
use super::gate::{Lane, SessionGate};
use super::prompts::{self, Directive};
use super::transition::{ConversionRequest, Transition, transition};
use crate::config::DialogueConfig;
use crate::currency::CurrencyCatalog;
use crate::error::DialogueResult;
use crate::rates::{RateProvider, convert};
use crate::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Lookup bound used when nothing else is configured.
const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// What [`DialogueController::begin`] left to do.
#[derive(Debug)]
pub enum Handled {
    /// The event is fully handled.
    Done(Vec<Directive>),
    /// A rate lookup is still needed; pass it to [`DialogueController::finish`].
    Lookup(PendingLookup),
}

/// A committed conversion waiting for its rate.
#[derive(Debug)]
pub struct PendingLookup {
    session_id: String,
    directives: Vec<Directive>,
    request: ConversionRequest,
    epoch: u64,
    lane: Arc<Mutex<Lane>>,
}

impl PendingLookup {
    /// The conversion to price.
    #[must_use]
    pub const fn request(&self) -> ConversionRequest {
        self.request
    }
}

/// Drives every session through the conversion dialogue.
///
/// Cheap to share behind an `Arc`; all state lives in the store and the
/// per-session gate.
pub struct DialogueController {
    store: Arc<dyn SessionStore>,
    rates: Arc<dyn RateProvider>,
    catalog: Arc<CurrencyCatalog>,
    gate: SessionGate,
    lookup_timeout: Duration,
}

impl std::fmt::Debug for DialogueController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogueController")
            .field("rates", &self.rates.name())
            .field("currencies", &self.catalog.len())
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

impl DialogueController {
    /// Create a controller.
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        rates: Arc<dyn RateProvider>,
        catalog: Arc<CurrencyCatalog>,
    ) -> Self {
        Self {
            store,
            rates,
            catalog,
            gate: SessionGate::new(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Bound every rate lookup by `timeout`.
    #[must_use]
    pub const fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Apply the `dialogue` config section.
    #[must_use]
    pub const fn with_config(self, config: &DialogueConfig) -> Self {
        self.with_lookup_timeout(config.lookup_timeout())
    }

    /// Supported currencies.
    #[must_use]
    pub fn catalog(&self) -> &CurrencyCatalog {
        &self.catalog
    }

    /// Session backend.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Handle one event and return what to tell the user.
    ///
    /// Never fails: invalid input becomes a re-prompt, an unavailable rate a
    /// failure message, and a broken session a generic error after which
    /// the session is cleared.
    pub async fn handle(&self, session_id: &str, event: DialogueEvent) -> Vec<Directive> {
        match self.begin(session_id, event).await {
            Handled::Done(directives) => directives,
            Handled::Lookup(pending) => self.finish(pending).await,
        }
    }

    /// Apply `event` to the stored session without waiting for a rate.
    ///
    /// Callers that process one session's events in order can run `begin`
    /// sequentially and [`finish`](Self::finish) concurrently: the session
    /// is already committed when this returns.
    pub async fn begin(&self, session_id: &str, event: DialogueEvent) -> Handled {
        let lane = self.gate.lane(session_id).await;

        let (step, epoch) = {
            let mut guard = lane.lock().await;
            match self.apply(session_id, &event).await {
                Ok(step) => {
                    if step.resets {
                        guard.advance();
                    }
                    (step, guard.epoch())
                }
                Err(e) => {
                    error!(session = %session_id, error = %e, "dialogue invariant violated");
                    if let Err(e) = self.store.clear(session_id).await {
                        error!(session = %session_id, error = %e, "failed to clear session");
                    }
                    return Handled::Done(vec![prompts::unexpected_error()]);
                }
            }
        };

        let Transition {
            directives,
            conversion,
            ..
        } = step;
        match conversion {
            Some(request) => Handled::Lookup(PendingLookup {
                session_id: session_id.to_string(),
                directives,
                request,
                epoch,
                lane,
            }),
            None => Handled::Done(directives),
        }
    }

    /// Look up the rate for `pending` and produce the result message.
    ///
    /// Returns nothing if the conversation was abandoned meanwhile.
    pub async fn finish(&self, pending: PendingLookup) -> Vec<Directive> {
        let PendingLookup {
            session_id,
            mut directives,
            request,
            epoch,
            lane,
        } = pending;

        let rate = self.lookup(request).await;

        if lane.lock().await.epoch() != epoch {
            debug!(
                session = %session_id,
                base = %request.base,
                target = %request.target,
                "discarding rate lookup for abandoned conversion"
            );
            return Vec::new();
        }

        directives.push(Self::outcome(request, rate));
        directives
    }

    async fn apply(&self, session_id: &str, event: &DialogueEvent) -> DialogueResult<Transition> {
        let session = self.store.get(session_id).await?;
        let step = transition(session, event, &self.catalog)?;
        if step.session != session {
            self.store.put(session_id, step.session).await?;
            debug!(
                session = %session_id,
                from = %session.stage(),
                to = %step.session.stage(),
                "session advanced"
            );
        }
        Ok(step)
    }

    async fn lookup(&self, request: ConversionRequest) -> Option<f64> {
        let fetch = self.rates.fetch_rate(request.base, request.target);
        match tokio::time::timeout(self.lookup_timeout, fetch).await {
            Ok(Some(rate)) if rate.is_finite() && rate > 0.0 => Some(rate),
            Ok(Some(rate)) => {
                warn!(provider = %self.rates.name(), rate, "provider returned an unusable rate");
                None
            }
            Ok(None) => None,
            Err(_) => {
                warn!(
                    provider = %self.rates.name(),
                    timeout = ?self.lookup_timeout,
                    "rate lookup timed out"
                );
                None
            }
        }
    }

    fn outcome(request: ConversionRequest, rate: Option<f64>) -> Directive {
        let ConversionRequest {
            amount,
            base,
            target,
        } = request;
        let Some(rate) = rate else {
            return prompts::rate_unavailable();
        };
        match convert(amount, rate) {
            Some(result) => {
                info!(%base, %target, amount, rate, result, "conversion completed");
                prompts::conversion_result(amount, base, result, target)
            }
            None => {
                warn!(%base, %target, amount, rate, "conversion overflowed");
                prompts::result_overflow()
            }
        }
    }
}
