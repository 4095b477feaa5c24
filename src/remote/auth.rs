//! Bearer-token contract.
//!
//! The password/2FA login and token-refresh workflow lives outside this
//! crate; all we consume is "give me a currently valid token".

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn valid_token(&self) -> Result<String>;
}

/// Fixed token, for tests and the demo.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn valid_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
