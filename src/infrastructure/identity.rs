use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;

use crate::config::{ConfigError, IdentityConfig};
use crate::domain::errors::DomainError;
use crate::domain::order::Identity;
use crate::domain::ports::IdentityVerifier;

pub const LOGIN_AGAIN: &str = "Authentication failed. Please login again and retry.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

/// Verifies ID tokens with an identity-toolkit style `accounts:lookup` call.
pub struct IdentityToolkitVerifier {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl IdentityToolkitVerifier {
    pub fn new(config: &IdentityConfig) -> Result<Self, ConfigError> {
        let mut url = Url::parse(&config.lookup_url).map_err(|_| ConfigError::Invalid {
            name: "IDENTITY_LOOKUP_URL",
            value: config.lookup_url.clone(),
        })?;
        url.query_pairs_mut().append_pair("key", &config.api_key);
        Ok(Self {
            client: Client::new(),
            url,
            timeout: config.timeout,
        })
    }
}

#[async_trait]
impl IdentityVerifier for IdentityToolkitVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, DomainError> {
        let response = self
            .client
            .post(self.url.clone())
            .timeout(self.timeout)
            .json(&json!({ "idToken": token }))
            .send()
            .await
            .map_err(|e| DomainError::Unavailable(format!("identity lookup failed: {e}")))?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            warn!("Identity service refused a token ({status})");
            return Err(DomainError::Unauthenticated(LOGIN_AGAIN.to_string()));
        }
        if !status.is_success() {
            return Err(DomainError::Unavailable(format!(
                "identity service responded with {status}"
            )));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Unavailable(format!("unreadable identity response: {e}")))?;
        let user = body
            .users
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::Unauthenticated(LOGIN_AGAIN.to_string()))?;
        let uid = user
            .local_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DomainError::Unauthenticated(LOGIN_AGAIN.to_string()))?;

        Ok(Identity {
            uid,
            email: user.email.unwrap_or_default(),
        })
    }
}
