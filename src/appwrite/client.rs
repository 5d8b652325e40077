use anyhow::{Context as _, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::config::AppwriteConfig;
use crate::error::{Provider, StoreError, StoreResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Appwrite {
    client: Client,
    config: AppwriteConfig,
}

/// Filter for list requests, serialized into a `queries[]` parameter
pub(super) struct Query {
    attribute: &'static str,
    value: String,
}

impl Query {
    pub(super) fn equal(attribute: &'static str, value: impl Into<String>) -> Self {
        Self {
            attribute,
            value: value.into(),
        }
    }

    fn to_param(&self) -> String {
        format!(
            r#"{{"method":"equal","attribute":{},"values":[{}]}}"#,
            json!(self.attribute),
            json!(self.value),
        )
    }
}

#[derive(Clone, Copy)]
pub(super) enum Collection {
    Users,
    BankAccounts,
}

impl Appwrite {
    pub fn new(config: &AppwriteConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn documents_url(&self, collection: Collection) -> String {
        let collection_id = match collection {
            Collection::Users => &self.config.user_collection_id,
            Collection::BankAccounts => &self.config.bank_collection_id,
        };
        format!(
            "{}/databases/{}/collections/{collection_id}/documents",
            self.config.endpoint.trim_end_matches('/'),
            self.config.database_id,
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("X-Appwrite-Project", &self.config.project)
            .header("X-Appwrite-Key", &self.config.key)
    }

    pub(super) async fn create_document<D: Serialize, T: DeserializeOwned>(
        &self,
        collection: Collection,
        data: &D,
    ) -> StoreResult<T> {
        let url = self.documents_url(collection);
        log::debug!("POST {url}");
        let request = self.authorized(self.client.post(&url)).json(&json!({
            "documentId": "unique()",
            "data": data,
        }));
        let (status, body) = send(request).await?;
        if status == StatusCode::CONFLICT {
            return Err(StoreError::Conflict(body));
        }
        parse(status, &body)
    }

    /// Returns `None` if the document doesn't exist
    pub(super) async fn get_document<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> StoreResult<Option<T>> {
        let url = format!("{}/{id}", self.documents_url(collection));
        log::debug!("GET {url}");
        let (status, body) = send(self.authorized(self.client.get(&url))).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse(status, &body).map(Some)
    }

    pub(super) async fn list_documents<T: DeserializeOwned>(
        &self,
        collection: Collection,
        queries: &[Query],
    ) -> StoreResult<T> {
        let url = self.documents_url(collection);
        log::debug!("GET {url}");
        let params: Vec<(&str, String)> = queries
            .iter()
            .map(|query| ("queries[]", query.to_param()))
            .collect();
        let request = self.authorized(self.client.get(&url)).query(&params);
        let (status, body) = send(request).await?;
        parse(status, &body)
    }
}

async fn send(request: RequestBuilder) -> StoreResult<(StatusCode, String)> {
    let response = request.send().await.map_err(appwrite_error)?;
    let status = response.status();
    log::debug!("Response Status: {status}");
    let body = response.text().await.map_err(appwrite_error)?;
    log::debug!("Response Body: {body}");
    Ok((status, body))
}

fn parse<T: DeserializeOwned>(status: StatusCode, body: &str) -> StoreResult<T> {
    if !status.is_success() {
        return Err(appwrite_error(format!("{status}: {body}")));
    }
    serde_json::from_str(body)
        .map_err(|err| appwrite_error(format!("Unexpected response: {err}")))
}

pub(super) fn appwrite_error(message: impl std::fmt::Display) -> StoreError {
    StoreError::backend(Provider::Appwrite, message)
}
