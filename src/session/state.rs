use serde::{Deserialize, Serialize};

use crate::types::UserIdentity;

/// Reactive session snapshot.
///
/// `authenticated` always mirrors `identity.is_some()`. Consumers must wait for
/// `ready` before branching on `authenticated`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub identity: Option<UserIdentity>,
    pub authenticated: bool,
    pub loading: bool,
    pub ready: bool,
    pub last_error: Option<String>,
}

/// Coarse lifecycle position derived from a [`Session`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display)]
pub enum SessionPhase {
    /// No rehydration attempt has resolved yet.
    Unknown,
    Anonymous,
    Authenticating,
    Authenticated,
}

impl Session {
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.ready && self.authenticated {
            SessionPhase::Authenticated
        } else if self.loading {
            SessionPhase::Authenticating
        } else if !self.ready {
            SessionPhase::Unknown
        } else {
            SessionPhase::Anonymous
        }
    }

    pub(crate) fn authenticate(&mut self, identity: UserIdentity) {
        self.identity = Some(identity);
        self.authenticated = true;
        self.last_error = None;
        self.ready = true;
    }

    pub(crate) fn sign_out(&mut self) {
        self.identity = None;
        self.authenticated = false;
        self.ready = true;
    }

    /// Signs out and drops any pending error, leaving nothing from the old session.
    pub(crate) fn reset(&mut self) {
        self.sign_out();
        self.last_error = None;
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            identity: self.identity.clone(),
            authenticated: self.authenticated,
        }
    }
}

/// The only part of a [`Session`] that is persisted.
///
/// Non-authoritative: it seeds optimistic rendering and is always confirmed by
/// an identity fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub identity: Option<UserIdentity>,
    pub authenticated: bool,
}
