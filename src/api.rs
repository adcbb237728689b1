//! Typed endpoint wrappers over [`RequestGateway::request`].

use reqwest::header::HeaderValue;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::Result;
use crate::error::Error;
use crate::gateway::{RequestGateway, RequestOptions};
use crate::types::request::{
    BuyRequest, ChallengeRequest, MarketsQuery, OtpRequest, OtpVerify, PreviewRequest,
    ProfileUpdate, SellRequest, WalletVerify,
};
use crate::types::{
    Address, AuthGrant, Balance, IdempotencyKey, Market, Outcome, Position, TradePreview,
    TradeReceipt, UserIdentity, WalletChallenge,
};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// `GET auth/me` answers either with the bare user or wrapped in `{"user": ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum MeResponse {
    Wrapped { user: UserIdentity },
    Bare(UserIdentity),
}

impl RequestGateway {
    pub async fn request_otp(&self, email: &str) -> Result<()> {
        self.request("auth/otp/request", RequestOptions::post(&OtpRequest { email })?)
            .await
            .map(drop)
    }

    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<AuthGrant> {
        self.request_typed(
            "auth/otp/verify",
            RequestOptions::post(&OtpVerify { email, code })?,
        )
        .await
    }

    pub async fn wallet_challenge(&self, address: Address) -> Result<WalletChallenge> {
        self.request_typed(
            "auth/wallet/challenge",
            RequestOptions::post(&ChallengeRequest { address })?,
        )
        .await
    }

    pub async fn verify_wallet(
        &self,
        address: Address,
        challenge: &WalletChallenge,
        signature: &str,
    ) -> Result<AuthGrant> {
        let body = WalletVerify {
            address,
            message: &challenge.message,
            signature,
            nonce: &challenge.nonce,
        };
        self.request_typed("auth/wallet/verify", RequestOptions::post(&body)?)
            .await
    }

    pub async fn current_user(&self) -> Result<UserIdentity> {
        let response: MeResponse = self.request_typed("auth/me", RequestOptions::get()).await?;
        Ok(match response {
            MeResponse::Wrapped { user } | MeResponse::Bare(user) => user,
        })
    }

    pub async fn logout(&self) -> Result<()> {
        self.request("auth/logout", RequestOptions::post(&serde_json::json!({}))?)
            .await
            .map(drop)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserIdentity> {
        let response: MeResponse = self
            .request_typed("users/me", RequestOptions::patch(update)?)
            .await?;
        Ok(match response {
            MeResponse::Wrapped { user } | MeResponse::Bare(user) => user,
        })
    }

    pub async fn trade_preview(
        &self,
        market_id: &str,
        outcome: Outcome,
        stake: Decimal,
    ) -> Result<TradePreview> {
        let body = PreviewRequest {
            market_id,
            outcome,
            stake,
        };
        self.request_typed("trades/preview", RequestOptions::post(&body)?)
            .await
    }

    /// Submits a buy once. The key travels both as a header and in the body.
    pub async fn buy(
        &self,
        market_id: &str,
        outcome: Outcome,
        stake: Decimal,
        idempotency_key: &IdempotencyKey,
    ) -> Result<TradeReceipt> {
        let body = BuyRequest {
            market_id,
            outcome,
            stake,
            idempotency_key,
        };
        let mut options = RequestOptions::post(&body)?;
        options.headers.insert(
            IDEMPOTENCY_KEY_HEADER,
            HeaderValue::from_str(idempotency_key.as_str())?,
        );
        self.request_typed("trades/buy", options).await
    }

    pub async fn sell(&self, position_id: &str, shares: Decimal) -> Result<TradeReceipt> {
        let body = SellRequest {
            position_id,
            shares,
        };
        self.request_typed("trades/sell", RequestOptions::post(&body)?)
            .await
    }

    pub async fn markets(&self, query: &MarketsQuery) -> Result<Vec<Market>> {
        let options = RequestOptions::builder()
            .query(serde_json::to_value(query)?)
            .build();
        self.request_typed("markets", options).await
    }

    pub async fn market(&self, market_id: &str) -> Result<Market> {
        if market_id.is_empty() || market_id.contains(['/', '?', '#']) {
            return Err(Error::validation(format!("invalid market id `{market_id}`")));
        }
        self.request_typed(&format!("markets/{market_id}"), RequestOptions::get())
            .await
    }

    pub async fn positions(&self) -> Result<Vec<Position>> {
        self.request_typed("portfolio/positions", RequestOptions::get())
            .await
    }

    pub async fn balance(&self) -> Result<Balance> {
        self.request_typed("portfolio/balance", RequestOptions::get())
            .await
    }
}
