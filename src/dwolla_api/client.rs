use anyhow::{anyhow, bail, Context as _, Result};
use reqwest::{header, Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::{DwollaConfig, DwollaEnvironment};

const SANDBOX_BASE_URL: &str = "https://api-sandbox.dwolla.com";
const PRODUCTION_BASE_URL: &str = "https://api.dwolla.com";

const HAL_JSON: &str = "application/vnd.dwolla.v1.hal+json";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tokens are refreshed this long before Dwolla would expire them
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

pub struct Dwolla {
    client: Client,
    base_url: String,
    key: String,
    secret: String,
    token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct ErrorResponse {
    code: Option<String>,
    message: Option<String>,
}

impl Dwolla {
    pub fn new(config: &DwollaConfig) -> Result<Self> {
        let base_url = match config.environment {
            DwollaEnvironment::Sandbox => SANDBOX_BASE_URL,
            DwollaEnvironment::Production => PRODUCTION_BASE_URL,
        };
        Self::with_base_url(config, base_url)
    }

    pub fn with_base_url(config: &DwollaConfig, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key: config.key.clone(),
            secret: config.secret.clone(),
            token: Mutex::new(None),
        })
    }

    pub(super) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Client credentials token, cached until shortly before it expires
    async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if let Some(cached) = token.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        let url = self.url("/token");
        log::debug!("POST {url}");
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key, Some(&self.secret))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;
        let response: TokenResponse = parse_json(check_status(response).await?).await?;

        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *token = Some(CachedToken {
            access_token: response.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(response.access_token)
    }

    /// POST a HAL+JSON body to `url` and return the raw response after checking its status
    pub(super) async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Response> {
        let access_token = self.access_token().await?;
        log::debug!("POST {url}");
        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .header(header::ACCEPT, HAL_JSON)
            .header(header::CONTENT_TYPE, HAL_JSON)
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    log::debug!("Response Status: {status}");
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    log::debug!("Response Body: {body}");
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(ErrorResponse {
            code: Some(code),
            message: Some(message),
        }) => bail!("{status} {code}: {message}"),
        _ => bail!("{status}: {body}"),
    }
}

pub(super) async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.text().await?;
    log::debug!("Response Body: {body}");
    serde_json::from_str(&body).map_err(|err| anyhow!("Unexpected Dwolla response: {err}"))
}
