#![allow(dead_code, reason = "not every test binary uses every helper")]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use httpmock::MockServer;
use market_client_sdk::ClientContext;
use market_client_sdk::config::ClientConfig;
use market_client_sdk::error::Error;
use market_client_sdk::storage::{MemoryStorage, Storage as _};
use serde_json::{Value, json};

pub const TOKEN_KEY: &str = "auth_token";
pub const SESSION_KEY: &str = "auth_session";

pub fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::from_raw(&server.url("/api")).expect("config")
}

pub fn user(id: &str, email: &str) -> Value {
    json!({ "id": id, "email": email, "role": "user" })
}

/// Counts auth-failure callbacks.
#[derive(Clone, Debug, Default)]
pub struct Expirations(pub Arc<AtomicUsize>);

impl Expirations {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Harness {
    pub server: MockServer,
    pub storage: MemoryStorage,
    pub ctx: ClientContext,
    pub expirations: Expirations,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_token(None).await
    }

    /// Starts with `token` already in durable storage, as after a restart.
    pub async fn with_token(token: Option<&str>) -> Self {
        let server = MockServer::start_async().await;
        let storage = MemoryStorage::new();
        if let Some(token) = token {
            storage.set(TOKEN_KEY, token).expect("seed token");
        }

        let expirations = Expirations::default();
        let counter = Arc::clone(&expirations.0);
        let ctx = ClientContext::with_auth_failure_handler(
            config(&server),
            Arc::new(storage.clone()),
            Arc::new(move |_: &Error| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        Self {
            server,
            storage,
            ctx,
            expirations,
        }
    }

    pub fn stored_token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY).expect("read token")
    }

    pub fn stored_snapshot(&self) -> Option<Value> {
        self.storage
            .get(SESSION_KEY)
            .expect("read snapshot")
            .map(|raw| serde_json::from_str(&raw).expect("snapshot json"))
    }
}
