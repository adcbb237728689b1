use rust_decimal::Decimal;

use crate::types::{Balance, IdempotencyKey, Outcome, TradePreview};

/// Inputs a preview was quoted for. A preview is only valid for its key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PreviewKey {
    pub market_id: String,
    pub outcome: Outcome,
    pub stake: Decimal,
}

/// A buy submission and the idempotency key it travels with.
///
/// Resubmitting the same `BuyOrder` is a retry; a new user-initiated purchase
/// must build a new one.
#[derive(Clone, Debug, PartialEq)]
pub struct BuyOrder {
    pub market_id: String,
    pub outcome: Outcome,
    pub stake: Decimal,
    pub key: IdempotencyKey,
}

impl BuyOrder {
    #[must_use]
    pub fn new<S: Into<String>>(market_id: S, outcome: Outcome, stake: Decimal) -> Self {
        Self {
            market_id: market_id.into(),
            outcome,
            stake,
            key: IdempotencyKey::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TradeState {
    pub preview: Option<TradePreview>,
    pub preview_key: Option<PreviewKey>,
    pub preview_loading: bool,
    pub submitting: bool,
    /// The most recently submitted buy, kept so a failed submission can be retried.
    pub last_order: Option<BuyOrder>,
    pub balance: Option<Balance>,
    pub last_error: Option<String>,
}

/// Result of a [`fetch_preview`](super::TradeCoordinator::fetch_preview) call.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum PreviewOutcome {
    /// Non-positive stake: the preview was cleared without a request.
    Cleared,
    Ready(TradePreview),
    /// A newer preview request was issued before this one resolved.
    Superseded,
}

impl TradeState {
    pub(crate) fn clear_preview(&mut self) {
        self.preview = None;
        self.preview_key = None;
        self.preview_loading = false;
    }
}
