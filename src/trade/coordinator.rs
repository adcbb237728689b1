use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::error::Error;
use crate::gateway::RequestGateway;
use crate::session::SessionController;
use crate::trade::{BuyOrder, PreviewKey, PreviewOutcome, TradeState};
use crate::types::{Balance, Outcome, TradeReceipt};

/// Reacts to an authorization failure after the session has been logged out.
///
/// The UI layer implements this to notify the user and leave the trading surface.
pub trait AuthFailureHandler: Send + Sync {
    fn on_auth_failure(&self, error: &Error);
}

impl<F> AuthFailureHandler for F
where
    F: Fn(&Error) + Send + Sync,
{
    fn on_auth_failure(&self, error: &Error) {
        self(error);
    }
}

/// Preview and execution of trades.
///
/// Failures are recorded in [`TradeState::last_error`] and also returned. An
/// authorization failure additionally logs the session out, invokes the
/// [`AuthFailureHandler`] once per ended session, and comes back as
/// [`Kind::AuthExpired`](crate::error::Kind::AuthExpired).
pub struct TradeCoordinator {
    gateway: Arc<RequestGateway>,
    session: Arc<SessionController>,
    on_auth_failure: Arc<dyn AuthFailureHandler>,
    state: watch::Sender<TradeState>,
    generation: AtomicU64,
    in_flight_preview: Mutex<CancellationToken>,
    submissions: AtomicUsize,
}

struct Submitting<'a> {
    coordinator: &'a TradeCoordinator,
}

impl Drop for Submitting<'_> {
    fn drop(&mut self) {
        let submissions = &self.coordinator.submissions;
        self.coordinator.state.send_modify(|s| {
            let remaining = submissions.fetch_sub(1, Ordering::SeqCst) - 1;
            s.submitting = remaining > 0;
        });
    }
}

impl std::fmt::Debug for TradeCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeCoordinator")
            .field("state", &*self.state.borrow())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl TradeCoordinator {
    #[must_use]
    pub fn new(
        gateway: Arc<RequestGateway>,
        session: Arc<SessionController>,
        on_auth_failure: Arc<dyn AuthFailureHandler>,
    ) -> Self {
        Self {
            gateway,
            session,
            on_auth_failure,
            state: watch::Sender::new(TradeState::default()),
            generation: AtomicU64::new(0),
            in_flight_preview: Mutex::new(CancellationToken::new()),
            submissions: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn get(&self) -> TradeState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TradeState> {
        self.state.subscribe()
    }

    /// Quotes a buy of `stake` on `outcome`.
    ///
    /// Debouncing is the caller's job. The last call issued wins: any earlier
    /// request still in flight is cancelled and its result discarded. A
    /// non-positive stake clears the preview without a request.
    pub async fn fetch_preview(
        &self,
        market_id: &str,
        outcome: Outcome,
        stake: Decimal,
    ) -> Result<PreviewOutcome> {
        let key = PreviewKey {
            market_id: market_id.to_owned(),
            outcome,
            stake,
        };
        let quoting = stake > Decimal::ZERO;
        let (generation, cancelled) = self.supersede(|s| {
            if !quoting || s.preview_key.as_ref() != Some(&key) {
                s.clear_preview();
            }
            s.preview_loading = quoting;
        });

        if !quoting {
            return Ok(PreviewOutcome::Cleared);
        }

        let fetched = tokio::select! {
            biased;
            () = cancelled.cancelled() => return Ok(PreviewOutcome::Superseded),
            fetched = self.gateway.trade_preview(market_id, outcome, stake) => fetched,
        };

        match fetched {
            Ok(preview) => {
                let applied = self.state.send_if_modified(|s| {
                    if self.generation.load(Ordering::SeqCst) != generation {
                        return false;
                    }
                    s.preview = Some(preview.clone());
                    s.preview_key = Some(key);
                    s.preview_loading = false;
                    s.last_error = None;
                    true
                });
                Ok(if applied {
                    PreviewOutcome::Ready(preview)
                } else {
                    PreviewOutcome::Superseded
                })
            }
            Err(e) => {
                let current = self.state.send_if_modified(|s| {
                    if self.generation.load(Ordering::SeqCst) != generation {
                        return false;
                    }
                    s.preview_loading = false;
                    true
                });
                if !current && !e.is_unauthorized() {
                    return Ok(PreviewOutcome::Superseded);
                }
                Err(self.fail(e).await)
            }
        }
    }

    /// Drops the current preview and abandons any request still in flight.
    pub fn clear_preview(&self) {
        self.supersede(TradeState::clear_preview);
    }

    /// Buys with a freshly minted idempotency key. Submitted once, never retried here.
    pub async fn execute_buy(
        &self,
        market_id: &str,
        outcome: Outcome,
        stake: Decimal,
    ) -> Result<TradeReceipt> {
        self.submit_buy(&BuyOrder::new(market_id, outcome, stake))
            .await
    }

    /// Submits `order` once, reusing its idempotency key.
    ///
    /// Passing the same order again is how a caller retries without risking a
    /// duplicate fill; deduplication itself is the server's contract.
    pub async fn submit_buy(&self, order: &BuyOrder) -> Result<TradeReceipt> {
        if order.stake <= Decimal::ZERO {
            return Err(self.reject(format!("stake must be positive, got {}", order.stake)));
        }

        let _submitting = self.begin_submit(Some(order));
        match self
            .gateway
            .buy(&order.market_id, order.outcome, order.stake, &order.key)
            .await
        {
            Ok(receipt) => {
                self.state.send_modify(|s| s.last_error = None);

                #[cfg(feature = "tracing")]
                tracing::debug!(market = %order.market_id, key = %order.key, "buy submitted");
                Ok(receipt)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Sells `shares` of a position. Single shot, no idempotency key.
    pub async fn execute_sell(&self, position_id: &str, shares: Decimal) -> Result<TradeReceipt> {
        if shares <= Decimal::ZERO {
            return Err(self.reject(format!("shares must be positive, got {shares}")));
        }

        let _submitting = self.begin_submit(None);
        match self.gateway.sell(position_id, shares).await {
            Ok(receipt) => {
                self.state.send_modify(|s| s.last_error = None);
                Ok(receipt)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    pub async fn refresh_balance(&self) -> Result<Balance> {
        match self.gateway.balance().await {
            Ok(balance) => {
                self.state.send_modify(|s| s.balance = Some(balance.clone()));
                Ok(balance)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Bumps the preview generation, cancels the request in flight and applies
    /// `update`, all under the state lock.
    fn supersede<F: FnOnce(&mut TradeState)>(&self, update: F) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        {
            let mut in_flight = self
                .in_flight_preview
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            in_flight.cancel();
            *in_flight = token.clone();
        }

        let mut generation = 0;
        self.state.send_modify(|s| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            update(s);
        });
        (generation, token)
    }

    fn begin_submit(&self, order: Option<&BuyOrder>) -> Submitting<'_> {
        let submissions = &self.submissions;
        self.state.send_modify(|s| {
            submissions.fetch_add(1, Ordering::SeqCst);
            s.submitting = true;
            s.last_error = None;
            if let Some(order) = order {
                s.last_order = Some(order.clone());
            }
        });
        Submitting { coordinator: self }
    }

    fn reject(&self, reason: String) -> Error {
        let error = Error::validation(reason);
        let message = error.message();
        self.state.send_modify(|s| s.last_error = Some(message));
        error
    }

    /// Records the failure; an authorization failure also ends the session.
    async fn fail(&self, error: Error) -> Error {
        let message = error.message();
        self.state.send_modify(|s| s.last_error = Some(message));

        if !error.is_unauthorized() {
            return error;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(error = %error, "authorization rejected while trading, logging out");

        self.clear_preview();
        self.state.send_modify(|s| {
            s.balance = None;
            s.last_order = None;
        });
        if self.session.end_session().await {
            self.on_auth_failure.on_auth_failure(&error);
        }
        error.into_auth_expired()
    }
}
