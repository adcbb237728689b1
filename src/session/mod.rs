//! Session lifecycle: rehydration, one-time-code and wallet sign-in, logout.
//!
//! ```text
//! Unknown ──check_auth──▶ Anonymous ◀──logout / rejected credential──┐
//!                            │                                       │
//!              request_otp / verify_otp / login_with_wallet          │
//!                            ▼                                       │
//!                      Authenticating ──success──▶ Authenticated ────┘
//! ```

mod controller;
mod state;

pub use controller::SessionController;
pub use state::{Session, SessionPhase, SessionSnapshot};
