use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace};
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::config::{ArchiveConfig, ConfigError};
use crate::domain::errors::ArchiveError;
use crate::domain::ports::{ArchivePayload, ArchiveReceipt, OrderArchiver};

use super::retry::RetryPolicy;

const DETAIL_LIMIT: usize = 240;

/// Response of the archive webhook. Different deployments of the script name
/// the id and url fields differently, so all known spellings are accepted.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArchiveResponse {
    ok: Option<bool>,
    message: Option<String>,
    order_sheet_id: Option<String>,
    spreadsheet_id: Option<String>,
    file_id: Option<String>,
    order_sheet_url: Option<String>,
    spreadsheet_url: Option<String>,
    file_url: Option<String>,
    master_logged: Option<bool>,
}

/// Posts orders to an external archive (a spreadsheet webhook) over HTTP.
#[derive(Clone)]
pub struct HttpOrderArchiver {
    client: Client,
    url: Url,
    timeout: Duration,
    retry: RetryPolicy<ArchiveError>,
}

impl HttpOrderArchiver {
    pub fn new(config: &ArchiveConfig) -> Result<Self, ConfigError> {
        let mut url = Url::parse(&config.endpoint).map_err(|_| ConfigError::Invalid {
            name: "ARCHIVE_ENDPOINT",
            value: config.endpoint.clone(),
        })?;
        if let Some(secret) = &config.shared_secret {
            url.query_pairs_mut().append_pair("secret", secret);
        }
        Ok(Self {
            client: Client::new(),
            url,
            timeout: config.timeout,
            retry: RetryPolicy::new(config.max_attempts, config.backoff, ArchiveError::is_transient),
        })
    }

    async fn attempt(&self, payload: &ArchivePayload) -> Result<ArchiveReceipt, ArchiveError> {
        let response = self
            .client
            .post(self.url.clone())
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.request_error(e))?;
        trace!("Archive endpoint answered {status}: {text}");
        let parsed = serde_json::from_str::<ArchiveResponse>(&text).ok();

        if !status.is_success() {
            let detail = parsed
                .as_ref()
                .and_then(|p| non_blank(p.message.as_deref()))
                .unwrap_or_else(|| excerpt(&text));
            return Err(ArchiveError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let Some(parsed) = parsed else {
            return Err(ArchiveError::Malformed(describe_non_json(&text)));
        };
        if parsed.ok == Some(false) {
            let message = non_blank(parsed.message.as_deref())
                .unwrap_or_else(|| "the archive rejected the order".to_string());
            return Err(ArchiveError::Rejected(message));
        }
        receipt_from(parsed, &payload.order_id.to_string())
    }

    fn request_error(&self, e: reqwest::Error) -> ArchiveError {
        if e.is_timeout() {
            ArchiveError::Timeout(self.timeout.as_millis() as u64)
        } else {
            ArchiveError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl OrderArchiver for HttpOrderArchiver {
    async fn archive(&self, payload: &ArchivePayload) -> Result<ArchiveReceipt, ArchiveError> {
        debug!("Archiving order {} ({})", payload.order_number, payload.order_id);
        self.retry
            .run("archive order", |_| self.attempt(payload))
            .await
    }
}

fn receipt_from(response: ArchiveResponse, fallback_id: &str) -> Result<ArchiveReceipt, ArchiveError> {
    let sheet_id = non_blank(response.order_sheet_id.as_deref())
        .or_else(|| non_blank(response.spreadsheet_id.as_deref()))
        .or_else(|| non_blank(response.file_id.as_deref()));
    let sheet_url = non_blank(response.order_sheet_url.as_deref())
        .or_else(|| non_blank(response.spreadsheet_url.as_deref()))
        .or_else(|| non_blank(response.file_url.as_deref()));

    if sheet_id.is_none() && sheet_url.is_none() {
        return Err(ArchiveError::Malformed(
            "response carried neither a sheet id nor a sheet url".to_string(),
        ));
    }
    Ok(ArchiveReceipt {
        sheet_id: sheet_id.unwrap_or_else(|| fallback_id.to_string()),
        sheet_url: sheet_url.unwrap_or_default(),
        master_logged: response.master_logged.unwrap_or(false),
    })
}

fn describe_non_json(text: &str) -> String {
    let lower = text.to_lowercase();
    if lower.contains("script function not found: dopost") {
        "the deployed script does not handle POST requests".to_string()
    } else if lower.contains("sign in") || lower.contains("accounts.google.com") {
        "the endpoint requires a login; deploy it with anonymous access".to_string()
    } else {
        "the endpoint returned a non-JSON response".to_string()
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn excerpt(text: &str) -> String {
    let excerpt: String = text.trim().chars().take(DETAIL_LIMIT).collect();
    if excerpt.is_empty() {
        "Unknown error".to_string()
    } else {
        excerpt
    }
}
