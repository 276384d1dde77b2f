//! Identity backend backed by the local token signer.
//!
//! Refreshing a session credential means signing a fresh short-lived
//! token; the previous credential is irrelevant to the new one.

use async_trait::async_trait;
use domain::error::AuthError;
use domain::models::{Credential, Session};
use domain::services::IdentityBackend;
use shared::jwt::TokenSigner;
use std::sync::Arc;

pub struct SignerIdentityBackend {
    signer: Arc<TokenSigner>,
}

impl SignerIdentityBackend {
    pub fn new(signer: Arc<TokenSigner>) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl IdentityBackend for SignerIdentityBackend {
    async fn refresh_credential(
        &self,
        session: &Session,
        _existing: Option<&Credential>,
    ) -> Result<Credential, AuthError> {
        let (token, expires_at) = self
            .signer
            .issue(session.user_id)
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
        Ok(Credential { token, expires_at })
    }
}
