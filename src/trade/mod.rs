//! Debounce-aware trade previews and duplicate-safe trade submission.

mod coordinator;
mod state;

pub use coordinator::{AuthFailureHandler, TradeCoordinator};
pub use state::{BuyOrder, PreviewKey, PreviewOutcome, TradeState};
