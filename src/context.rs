use std::sync::Arc;

use reqwest::Client as ReqwestClient;

use crate::config::ClientConfig;
use crate::credential::CredentialStore;
use crate::error::Error;
use crate::gateway::RequestGateway;
use crate::session::SessionController;
use crate::storage::Storage;
use crate::trade::{AuthFailureHandler, TradeCoordinator};

/// Everything that issues requests, wired once by the application root.
///
/// Cheap to clone; clones share the same credential and session.
#[derive(Clone, Debug)]
pub struct ClientContext {
    credentials: Arc<CredentialStore>,
    gateway: Arc<RequestGateway>,
    session: Arc<SessionController>,
    trade: Arc<TradeCoordinator>,
}

impl ClientContext {
    /// Builds the context without an auth-failure handler.
    #[must_use]
    pub fn new(config: ClientConfig, storage: Arc<dyn Storage>) -> Self {
        Self::with_http_client(config, storage, ReqwestClient::new(), Arc::new(|_: &Error| {}))
    }

    #[must_use]
    pub fn with_auth_failure_handler(
        config: ClientConfig,
        storage: Arc<dyn Storage>,
        on_auth_failure: Arc<dyn AuthFailureHandler>,
    ) -> Self {
        Self::with_http_client(config, storage, ReqwestClient::new(), on_auth_failure)
    }

    #[must_use]
    pub fn with_http_client(
        config: ClientConfig,
        storage: Arc<dyn Storage>,
        client: ReqwestClient,
        on_auth_failure: Arc<dyn AuthFailureHandler>,
    ) -> Self {
        let credentials = Arc::new(CredentialStore::new(
            Arc::clone(&storage),
            config.token_key.clone(),
        ));
        let gateway = Arc::new(RequestGateway::new(config, client, Arc::clone(&credentials)));
        let session = Arc::new(SessionController::new(Arc::clone(&gateway), storage));
        let trade = Arc::new(TradeCoordinator::new(
            Arc::clone(&gateway),
            Arc::clone(&session),
            on_auth_failure,
        ));

        Self {
            credentials,
            gateway,
            session,
            trade,
        }
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<RequestGateway> {
        &self.gateway
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionController> {
        &self.session
    }

    #[must_use]
    pub fn trade(&self) -> &Arc<TradeCoordinator> {
        &self.trade
    }
}
