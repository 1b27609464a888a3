//! Bearer-token verification against an external identity provider.
//!
//! Sign-in, sign-up and password reset stay with the provider; this crate only
//! needs to turn a session token into the owning user id.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve `token` to an [`Identity`] or fail with [`Error::Unauthorized`].
    async fn verify(&self, token: &str) -> Result<Identity>;
}

/// User-info claims. Providers differ in which key carries the subject, and
/// some send several of them at once.
#[derive(Deserialize)]
struct UserInfo {
    sub: Option<String>,
    user_id: Option<String>,
    #[serde(rename = "localId")]
    local_id: Option<String>,
    uid: Option<String>,
    email: Option<String>,
}

impl UserInfo {
    fn subject(self) -> Option<String> {
        [self.sub, self.user_id, self.local_id, self.uid]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
    }
}

/// Verifies tokens by calling an OpenID-style user-info endpoint.
#[derive(Debug, Clone)]
pub struct UserInfoIdentity {
    http: Client,
    url: String,
}

impl UserInfoIdentity {
    pub fn new(url: impl Into<String>) -> Self {
        Self { http: Client::new(), url: url.into() }
    }
}

#[async_trait]
impl IdentityProvider for UserInfoIdentity {
    async fn verify(&self, token: &str) -> Result<Identity> {
        if token.is_empty() {
            return Err(Error::Unauthorized("empty token".into()));
        }

        let resp = self.http.get(&self.url).bearer_auth(token).send().await?;
        match resp.status() {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Error::Unauthorized("token rejected by identity provider".into()));
            }
            s => {
                let message = resp.text().await.unwrap_or_default();
                return Err(Error::Upstream { status: s.as_u16(), message });
            }
        }

        let mut info: UserInfo = resp.json().await?;
        let email = info.email.take();
        let user_id = info
            .subject()
            .ok_or_else(|| Error::Unauthorized("identity provider returned no subject".into()))?;
        debug!(user_id = %user_id, "token verified");
        Ok(Identity { user_id, email })
    }
}
