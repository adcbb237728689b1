use url::Url;

use crate::Result;
use crate::error::Error;

pub const DEFAULT_TOKEN_KEY: &str = "auth_token";
pub const DEFAULT_SESSION_KEY: &str = "auth_session";

/// Client bootstrap configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base path every endpoint is joined beneath, always ending in `/`.
    pub host: Url,
    /// Durable storage key holding the raw bearer credential.
    pub token_key: String,
    /// Durable storage key holding the cached `{identity, authenticated}` snapshot.
    pub session_key: String,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn from_raw(host: &str) -> Result<Self> {
        let host = Url::parse(host)?;
        Self::new(host)
    }

    pub fn new(mut host: Url) -> Result<Self> {
        if !matches!(host.scheme(), "http" | "https") {
            return Err(Error::validation(format!(
                "host must be http or https, got scheme `{}`",
                host.scheme()
            )));
        }
        if host.cannot_be_a_base() {
            return Err(Error::validation(format!("host {host} cannot be a base url")));
        }
        if !host.path().ends_with('/') {
            let path = format!("{}/", host.path());
            host.set_path(&path);
        }

        Ok(Self {
            host,
            token_key: DEFAULT_TOKEN_KEY.to_owned(),
            session_key: DEFAULT_SESSION_KEY.to_owned(),
            user_agent: concat!("market-client-sdk/", env!("CARGO_PKG_VERSION")).to_owned(),
        })
    }

    #[must_use]
    pub fn with_token_key<S: Into<String>>(mut self, key: S) -> Self {
        self.token_key = key.into();
        self
    }

    #[must_use]
    pub fn with_session_key<S: Into<String>>(mut self, key: S) -> Self {
        self.session_key = key.into();
        self
    }

    #[must_use]
    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.host.join(path.trim_start_matches('/'))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_gets_trailing_slash() -> Result<()> {
        let config = ClientConfig::from_raw("https://markets.example.com/api")?;
        assert_eq!(config.host.as_str(), "https://markets.example.com/api/");
        assert_eq!(
            config.endpoint("/auth/me")?.as_str(),
            "https://markets.example.com/api/auth/me"
        );
        assert_eq!(
            config.endpoint("markets/42")?.as_str(),
            "https://markets.example.com/api/markets/42"
        );
        Ok(())
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = ClientConfig::from_raw("ftp://markets.example.com/api").unwrap_err();
        assert_eq!(err.kind(), crate::error::Kind::Validation);
    }

    #[test]
    fn default_keys() -> Result<()> {
        let config = ClientConfig::from_raw("http://localhost:8080/api/")?
            .with_token_key("custom_token");
        assert_eq!(config.token_key, "custom_token");
        assert_eq!(config.session_key, DEFAULT_SESSION_KEY);
        Ok(())
    }
}
