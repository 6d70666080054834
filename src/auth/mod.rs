//! Credential boundary for the upstream reporting API.
//!
//! The OAuth authorization-code and refresh-token dance lives outside this
//! core; whatever runs it hands us a bearer credential through the
//! [`TokenProvider`] seam. The types here validate that input before it
//! reaches the aggregation layer.

use anyhow::{bail, Result};
use async_trait::async_trait;

/// A validated upstream bearer credential.
///
/// Rejects empty values and anything containing whitespace or control
/// bytes, which would corrupt the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            bail!("bearer token must not be empty");
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            bail!("bearer token must not contain whitespace or control characters");
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Supplies a valid bearer credential per upstream call.
///
/// The production implementation sits on top of the external OAuth
/// refresh flow; tests and single-tenant deployments use
/// [`StaticTokenProvider`].
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<BearerToken>;
}

/// Token provider backed by a fixed credential (e.g. from the environment).
pub struct StaticTokenProvider {
    token: BearerToken,
}

impl StaticTokenProvider {
    pub fn new(token: BearerToken) -> Self {
        Self { token }
    }

    pub fn from_env() -> Result<Self> {
        let raw = std::env::var("REPORTING_BEARER_TOKEN")
            .map_err(|_| anyhow::anyhow!("REPORTING_BEARER_TOKEN must be set"))?;
        Ok(Self::new(BearerToken::new(raw)?))
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<BearerToken> {
        Ok(self.token.clone())
    }
}
