//! Wallet signature capability used by the challenge/response sign-in.
//!
//! Implementations receive the challenge message exactly as the server issued
//! it and must sign it unaltered. A rejection (the user declines, the wallet is
//! locked) surfaces as [`Kind::Signer`](crate::error::Kind::Signer) with the
//! wallet's reason kept verbatim.

use std::fmt;
use std::str::FromStr as _;

use alloy::primitives::hex;
use alloy::signers::Signer as _;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use secrecy::{ExposeSecret as _, SecretString};

use crate::Result;
use crate::error::Error;
use crate::types::Address;

#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Returns the signature over `message`, hex encoded.
    async fn sign(&self, message: &str) -> Result<String>;
}

/// EIP-191 personal-sign with a locally held private key.
#[derive(Clone)]
pub struct LocalSigner {
    inner: PrivateKeySigner,
}

impl LocalSigner {
    pub fn from_private_key(private_key: &SecretString) -> Result<Self> {
        PrivateKeySigner::from_str(private_key.expose_secret())
            .map_err(|e| Error::validation(format!("invalid private key: {e}")))
            .map(|inner| Self { inner })
    }

    #[must_use]
    pub fn random() -> Self {
        Self {
            inner: PrivateKeySigner::random(),
        }
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.inner.address()
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.inner.address())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl WalletSigner for LocalSigner {
    async fn sign(&self, message: &str) -> Result<String> {
        let signature = self.inner.sign_message(message.as_bytes()).await?;
        Ok(hex::encode_prefixed(signature.as_bytes()))
    }
}

/// Adapts an async closure into a [`WalletSigner`].
///
/// `Err(reason)` from the closure becomes a signer rejection carrying `reason`.
pub struct SignFn<F>(pub F);

impl<F> fmt::Debug for SignFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignFn")
    }
}

#[async_trait]
impl<F, Fut> WalletSigner for SignFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<String, String>> + Send,
{
    async fn sign(&self, message: &str) -> Result<String> {
        (self.0)(message.to_owned()).await.map_err(Error::signer)
    }
}
