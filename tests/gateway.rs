mod common;

use std::sync::Arc;

use httpmock::Method::{GET, POST};
use market_client_sdk::config::ClientConfig;
use market_client_sdk::credential::CredentialStore;
use market_client_sdk::error::Kind;
use market_client_sdk::gateway::{FALLBACK_ERROR_MESSAGE, RequestGateway, RequestOptions};
use market_client_sdk::storage::MemoryStorage;
use reqwest::StatusCode;
use secrecy::SecretString;
use serde_json::json;

use crate::common::Harness;

#[tokio::test]
async fn no_content_synthesizes_success() -> anyhow::Result<()> {
    let h = Harness::new().await;
    let mock = h
        .server
        .mock_async(|when, then| {
            when.method(POST).path("/api/auth/logout");
            then.status(204);
        })
        .await;

    let body = h
        .ctx
        .gateway()
        .request("auth/logout", RequestOptions::post(&json!({}))?)
        .await?;

    assert_eq!(body, json!({"success": true}));
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn empty_ok_body_synthesizes_success() -> anyhow::Result<()> {
    let h = Harness::new().await;
    h.server
        .mock_async(|when, then| {
            when.method(GET).path("/api/empty");
            then.status(200);
        })
        .await;
    h.server
        .mock_async(|when, then| {
            when.method(GET).path("/api/empty-json");
            then.status(200)
                .header("content-type", "application/json")
                .body("");
        })
        .await;

    let gateway = h.ctx.gateway();
    assert_eq!(
        gateway.request("empty", RequestOptions::get()).await?,
        json!({"success": true})
    );
    assert_eq!(
        gateway.request("empty-json", RequestOptions::get()).await?,
        json!({"success": true})
    );
    Ok(())
}

#[tokio::test]
async fn json_body_is_parsed() -> anyhow::Result<()> {
    let h = Harness::new().await;
    h.server
        .mock_async(|when, then| {
            when.method(GET).path("/api/thing");
            then.status(200)
                .header("content-type", "application/json; charset=utf-8")
                .body(r#"{"a":1}"#);
        })
        .await;

    let body = h.ctx.gateway().request("thing", RequestOptions::get()).await?;
    assert_eq!(body, json!({"a": 1}));
    Ok(())
}

#[tokio::test]
async fn lenient_on_non_json_and_unparsable_success() -> anyhow::Result<()> {
    let h = Harness::new().await;
    h.server
        .mock_async(|when, then| {
            when.method(GET).path("/api/text");
            then.status(200)
                .header("content-type", "text/plain")
                .body("OK");
        })
        .await;
    h.server
        .mock_async(|when, then| {
            when.method(GET).path("/api/broken");
            then.status(200)
                .header("content-type", "application/json")
                .body("{\"a\":");
        })
        .await;

    let gateway = h.ctx.gateway();
    assert_eq!(
        gateway.request("text", RequestOptions::get()).await?,
        json!({"success": true})
    );
    assert_eq!(
        gateway.request("broken", RequestOptions::get()).await?,
        json!({"success": true})
    );
    Ok(())
}

#[tokio::test]
async fn failure_uses_body_message() -> anyhow::Result<()> {
    let h = Harness::new().await;
    h.server
        .mock_async(|when, then| {
            when.method(GET).path("/api/markets/missing");
            then.status(404)
                .header("content-type", "application/json")
                .body(r#"{"message":"X"}"#);
        })
        .await;

    let err = h
        .ctx
        .gateway()
        .request("markets/missing", RequestOptions::get())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Kind::Status);
    assert_eq!(err.message(), "X");
    assert_eq!(err.status_code(), Some(StatusCode::NOT_FOUND));
    assert!(!err.is_unauthorized(), "404 is not an auth failure");
    Ok(())
}

#[tokio::test]
async fn failure_without_readable_message_uses_fallback() -> anyhow::Result<()> {
    let h = Harness::new().await;
    h.server
        .mock_async(|when, then| {
            when.method(GET).path("/api/boom");
            then.status(500)
                .header("content-type", "text/html")
                .body("<h1>Internal Server Error</h1>");
        })
        .await;

    let err = h
        .ctx
        .gateway()
        .request("boom", RequestOptions::get())
        .await
        .unwrap_err();

    assert_eq!(err.message(), FALLBACK_ERROR_MESSAGE);
    assert_ne!(err.message(), "Internal Server Error", "status text never leaks");
    assert_eq!(err.status_code(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    Ok(())
}

#[tokio::test]
async fn bearer_only_when_credential_present() -> anyhow::Result<()> {
    let h = Harness::new().await;
    let anonymous = h
        .server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/markets")
                .header("content-type", "application/json")
                .header_missing("authorization");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([]));
        })
        .await;

    h.ctx.gateway().request("markets", RequestOptions::get()).await?;
    anonymous.assert_async().await;

    h.ctx
        .credentials()
        .set(Some(SecretString::from("tok-1")))?;
    let authed = h
        .server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/portfolio/balance")
                .header("authorization", "Bearer tok-1");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"available": 12.5}));
        })
        .await;

    let balance = h.ctx.gateway().balance().await?;
    assert_eq!(balance.available.to_string(), "12.5");
    authed.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn credential_is_read_fresh_on_every_call() -> anyhow::Result<()> {
    let h = Harness::with_token(Some("first")).await;
    let first = h
        .server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/portfolio/positions")
                .header("authorization", "Bearer first");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([]));
        })
        .await;
    let second = h
        .server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/portfolio/positions")
                .header("authorization", "Bearer second");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([]));
        })
        .await;

    h.ctx.gateway().positions().await?;
    h.ctx
        .credentials()
        .set(Some(SecretString::from("second")))?;
    h.ctx.gateway().positions().await?;

    first.assert_calls_async(1).await;
    second.assert_calls_async(1).await;
    Ok(())
}

#[tokio::test]
async fn transport_failure_is_internal() -> anyhow::Result<()> {
    let storage = Arc::new(MemoryStorage::new());
    let credentials = Arc::new(CredentialStore::new(storage, "auth_token"));
    let gateway = RequestGateway::new(
        ClientConfig::from_raw("http://127.0.0.1:1/api")?,
        reqwest::Client::new(),
        credentials,
    );

    let err = gateway.request("auth/me", RequestOptions::get()).await.unwrap_err();
    assert_eq!(err.kind(), Kind::Internal);
    assert!(!err.message().is_empty(), "transport errors still carry a message");
    assert!(err.status_code().is_none(), "no status without a response");
    Ok(())
}

#[tokio::test]
async fn current_user_accepts_wrapped_and_bare() -> anyhow::Result<()> {
    let h = Harness::new().await;
    h.server
        .mock_async(|when, then| {
            when.method(GET).path("/api/auth/me");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"user": {"id": "u1", "email": "a@b.com", "role": "admin"}}));
        })
        .await;

    let user = h.ctx.gateway().current_user().await?;
    assert_eq!(user.id, "u1");
    assert!(user.is_admin(), "role decoded");
    Ok(())
}
