use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;

pub use alloy::primitives::Address;

#[non_exhaustive]
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Binary market outcome a position is taken on.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}

/// The authenticated user as reported by the server.
///
/// Replaced wholesale on refresh, never merged.
#[skip_serializing_none]
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: String,
    pub email: Option<String>,
    pub wallet_address: Option<Address>,
    #[serde(default)]
    pub role: Role,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl UserIdentity {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// One-time message issued by the server for wallet sign-in.
///
/// Single use and never persisted; `message` must be signed verbatim.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletChallenge {
    pub message: String,
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

/// Successful credential exchange.
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize)]
pub struct AuthGrant {
    pub token: SecretString,
    pub user: UserIdentity,
}

/// Quote for a prospective buy. Derived, never persisted.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradePreview {
    pub outcome: Outcome,
    pub stake: Decimal,
    pub shares: Decimal,
    pub fee: Decimal,
    pub total_cost: Decimal,
    pub estimated_payout: Decimal,
    pub estimated_profit: Decimal,
}

/// Server acknowledgement of a buy or sell.
///
/// Every field is optional: a bodiless success still decodes, so a completed
/// trade is never reported as a failure.
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TradeReceipt {
    pub success: Option<bool>,
    #[serde(alias = "tradeId")]
    pub id: Option<String>,
    pub market_id: Option<String>,
    pub position_id: Option<String>,
    pub outcome: Option<Outcome>,
    pub shares: Option<Decimal>,
    pub price: Option<Decimal>,
    pub total: Option<Decimal>,
    pub created_at: Option<DateTime<Utc>>,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub id: String,
    pub question: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub yes_price: Option<Decimal>,
    pub no_price: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub closes_at: Option<DateTime<Utc>>,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    pub market_id: String,
    pub outcome: Outcome,
    pub shares: Decimal,
    pub average_price: Option<Decimal>,
    pub current_value: Option<Decimal>,
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub available: Decimal,
    pub locked: Option<Decimal>,
    pub currency: Option<String>,
}

/// Client-generated token letting the server deduplicate retried buys.
///
/// Backed by a UUIDv7: a millisecond timestamp prefix followed by random bits,
/// so keys minted in concurrent tabs collide with negligible probability.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IdempotencyKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for IdempotencyKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

pub mod request {
    use rust_decimal::Decimal;
    use serde::Serialize;
    use serde_with::skip_serializing_none;

    use super::{Address, IdempotencyKey, Outcome};

    #[derive(Debug, Serialize)]
    pub struct OtpRequest<'a> {
        pub email: &'a str,
    }

    #[derive(Debug, Serialize)]
    pub struct OtpVerify<'a> {
        pub email: &'a str,
        pub code: &'a str,
    }

    #[derive(Debug, Serialize)]
    pub struct ChallengeRequest {
        pub address: Address,
    }

    #[derive(Debug, Serialize)]
    pub struct WalletVerify<'a> {
        pub address: Address,
        pub message: &'a str,
        pub signature: &'a str,
        pub nonce: &'a str,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PreviewRequest<'a> {
        pub market_id: &'a str,
        pub outcome: Outcome,
        #[serde(with = "rust_decimal::serde::float")]
        pub stake: Decimal,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BuyRequest<'a> {
        pub market_id: &'a str,
        pub outcome: Outcome,
        #[serde(with = "rust_decimal::serde::float")]
        pub stake: Decimal,
        pub idempotency_key: &'a IdempotencyKey,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SellRequest<'a> {
        pub position_id: &'a str,
        #[serde(with = "rust_decimal::serde::float")]
        pub shares: Decimal,
    }

    #[skip_serializing_none]
    #[derive(Debug, Default, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProfileUpdate {
        pub display_name: Option<String>,
        pub avatar_url: Option<String>,
    }

    #[skip_serializing_none]
    #[derive(Debug, Default, Serialize)]
    pub struct MarketsQuery {
        pub status: Option<String>,
        pub search: Option<String>,
        pub limit: Option<u32>,
        pub offset: Option<u32>,
    }
}
