use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use secrecy::{ExposeSecret as _, SecretString};
use tokio::sync::watch;

use crate::Result;
use crate::error::Error;
use crate::gateway::RequestGateway;
use crate::session::{Session, SessionSnapshot};
use crate::signer::WalletSigner;
use crate::storage::Storage;
use crate::types::{Address, AuthGrant, UserIdentity};

/// Orchestrates sign-in flows, rehydration and logout over a reactive [`Session`].
///
/// Actions never return errors: failures land in [`Session::last_error`] and the
/// action reports `false`.
#[derive(Debug)]
pub struct SessionController {
    gateway: Arc<RequestGateway>,
    storage: Arc<dyn Storage>,
    state: watch::Sender<Session>,
    in_flight: AtomicUsize,
}

/// Marks one action as in flight for as long as it lives.
struct Busy<'a> {
    controller: &'a SessionController,
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        let in_flight = &self.controller.in_flight;
        self.controller.state.send_modify(|s| {
            let remaining = in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
            s.loading = remaining > 0;
        });
    }
}

impl SessionController {
    /// Seeds the session from the cached snapshot when a credential is held.
    ///
    /// The seeded identity is optimistic; the session stays not-ready until
    /// [`check_auth`](Self::check_auth) resolves.
    pub fn new(gateway: Arc<RequestGateway>, storage: Arc<dyn Storage>) -> Self {
        let mut initial = Session::default();
        if gateway.credentials().is_present() {
            if let Some(SessionSnapshot {
                identity: Some(identity),
                authenticated: true,
            }) = read_snapshot(storage.as_ref(), &gateway.config().session_key)
            {
                initial.identity = Some(identity);
                initial.authenticated = true;
            }
        }

        Self {
            gateway,
            storage,
            state: watch::Sender::new(initial),
            in_flight: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn get(&self) -> Session {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Rehydrates the session from the stored credential.
    ///
    /// Without a credential no request is made. Any failure of the identity
    /// fetch discards the credential that was checked. Safe to call repeatedly.
    pub async fn check_auth(&self) -> bool {
        let Some(token) = self.gateway.credentials().hydrate() else {
            self.state.send_modify(Session::sign_out);
            self.forget_snapshot();
            return false;
        };

        let _busy = self.begin(false);
        match self.gateway.current_user().await {
            Ok(identity) => {
                if !self.holds(&token) {
                    return self.get().authenticated;
                }
                self.state.send_modify(|s| s.authenticate(identity));
                self.persist_snapshot();

                #[cfg(feature = "tracing")]
                tracing::debug!("session rehydrated");
                true
            }
            #[cfg_attr(not(feature = "tracing"), expect(unused_variables, reason = "logged only with tracing"))]
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %e, "stored credential rejected, signing out");

                if self.holds(&token) {
                    self.tear_down();
                } else {
                    self.state.send_modify(|s| s.ready = true);
                }
                false
            }
        }
    }

    /// Asks the server to send a one-time code to `email`.
    pub async fn request_otp(&self, email: &str) -> bool {
        let _busy = self.begin(true);
        match self.gateway.request_otp(email).await {
            Ok(()) => {
                self.state.send_modify(|s| s.last_error = None);
                true
            }
            Err(e) => self.fail(&e),
        }
    }

    pub async fn verify_otp(&self, email: &str, code: &str) -> bool {
        let _busy = self.begin(true);
        let result = match self.gateway.verify_otp(email, code).await {
            Ok(grant) => self.establish(grant),
            Err(e) => Err(e),
        };
        self.settle(result)
    }

    /// Challenge, sign, verify. The first failing step aborts with its message.
    pub async fn login_with_wallet(&self, address: Address, signer: &dyn WalletSigner) -> bool {
        let _busy = self.begin(true);
        let result = match self.wallet_grant(address, signer).await {
            Ok(grant) => self.establish(grant),
            Err(e) => Err(e),
        };
        self.settle(result)
    }

    /// Refetches the identity and replaces it wholesale.
    ///
    /// A rejected credential tears the session down; other failures only set
    /// the error.
    pub async fn refresh_identity(&self) -> bool {
        let Some(token) = self.gateway.credentials().get() else {
            return false;
        };

        let _busy = self.begin(false);
        match self.gateway.current_user().await {
            Ok(identity) if self.holds(&token) => {
                self.state.send_modify(|s| s.authenticate(identity));
                self.persist_snapshot();
                true
            }
            Ok(_) => false,
            Err(e) if e.is_unauthorized() && self.holds(&token) => {
                self.tear_down();
                false
            }
            Err(e) => self.fail(&e),
        }
    }

    /// Notifies the server on a best-effort basis, then unconditionally signs out.
    pub async fn logout(&self) {
        self.end_session().await;
    }

    /// [`logout`](Self::logout), reporting whether this call ended a live session.
    ///
    /// Of several overlapping calls exactly one sees `true`.
    pub(crate) async fn end_session(&self) -> bool {
        if self.gateway.credentials().is_present() {
            let notified = self.gateway.logout().await;

            #[cfg(feature = "tracing")]
            if let Err(e) = notified {
                tracing::debug!(error = %e, "logout notification failed, ignoring");
            }
            #[cfg(not(feature = "tracing"))]
            drop(notified);
        }

        self.tear_down()
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|s| s.last_error = None);
    }

    async fn wallet_grant(&self, address: Address, signer: &dyn WalletSigner) -> Result<AuthGrant> {
        let challenge = self.gateway.wallet_challenge(address).await?;
        let signature = signer.sign(&challenge.message).await?;
        self.gateway
            .verify_wallet(address, &challenge, &signature)
            .await
    }

    fn begin(&self, clear_error: bool) -> Busy<'_> {
        let in_flight = &self.in_flight;
        self.state.send_modify(|s| {
            in_flight.fetch_add(1, Ordering::SeqCst);
            s.loading = true;
            if clear_error {
                s.last_error = None;
            }
        });
        Busy { controller: self }
    }

    /// Stores the credential, then publishes the identity, as one step.
    fn establish(&self, grant: AuthGrant) -> Result<UserIdentity> {
        let AuthGrant { token, user } = grant;
        let credentials = self.gateway.credentials();

        let mut stored = Ok(());
        self.state.send_modify(|s| {
            stored = credentials.set(Some(token));
            if stored.is_ok() {
                s.authenticate(user.clone());
            }
        });
        if let Err(e) = stored {
            let _cleared = credentials.clear();
            return Err(e);
        }
        self.persist_snapshot();

        #[cfg(feature = "tracing")]
        tracing::debug!(user = %user.id, "session established");
        Ok(user)
    }

    fn settle(&self, result: Result<UserIdentity>) -> bool {
        match result {
            Ok(_) => true,
            Err(e) => self.fail(&e),
        }
    }

    fn fail(&self, error: &Error) -> bool {
        let message = error.message();
        self.state.send_modify(|s| s.last_error = Some(message));
        false
    }

    /// Clears the credential and resets the session in one update.
    ///
    /// Returns `true` if a credential or an authenticated identity was dropped.
    fn tear_down(&self) -> bool {
        let credentials = self.gateway.credentials();
        let mut cleared = Ok(());
        let mut ended = false;
        self.state.send_modify(|s| {
            ended = s.authenticated || credentials.is_present();
            cleared = credentials.clear();
            s.reset();
        });
        self.forget_snapshot();

        #[cfg(feature = "tracing")]
        if let Err(e) = cleared {
            tracing::warn!(error = %e, "failed to remove stored credential");
        }
        #[cfg(not(feature = "tracing"))]
        drop(cleared);
        ended
    }

    /// `true` while `token` is still the live credential.
    fn holds(&self, token: &SecretString) -> bool {
        self.gateway
            .credentials()
            .get()
            .is_some_and(|current| current.expose_secret() == token.expose_secret())
    }

    fn persist_snapshot(&self) {
        let snapshot = self.state.borrow().snapshot();
        let key = &self.gateway.config().session_key;
        let written = serde_json::to_string(&snapshot)
            .map_err(Error::from)
            .and_then(|json| self.storage.set(key, &json));

        #[cfg(feature = "tracing")]
        if let Err(e) = written {
            tracing::warn!(error = %e, "failed to persist session snapshot");
        }
        #[cfg(not(feature = "tracing"))]
        drop(written);
    }

    fn forget_snapshot(&self) {
        let removed = self.storage.remove(&self.gateway.config().session_key);

        #[cfg(feature = "tracing")]
        if let Err(e) = removed {
            tracing::warn!(error = %e, "failed to remove session snapshot");
        }
        #[cfg(not(feature = "tracing"))]
        drop(removed);
    }
}

fn read_snapshot(storage: &dyn Storage, key: &str) -> Option<SessionSnapshot> {
    let raw = storage.get(key).ok()??;
    serde_json::from_str(&raw).ok()
}
