use anyhow::Result;
use async_trait::async_trait;
use reqwest::header;
use serde::Deserialize;
use serde_json::json;

use super::client::{parse_json, Dwolla};
use crate::db::{CustomerId, FundingSourceUrl};
use crate::error::{Provider, ProviderError};
use crate::link::{PaymentsProvider, ProcessorToken};

#[derive(Deserialize)]
struct Links {
    #[serde(rename = "_links")]
    links: SelfLink,
}

#[derive(Deserialize)]
struct SelfLink {
    #[serde(rename = "self")]
    self_: Href,
}

#[derive(Deserialize)]
struct Href {
    href: String,
}

impl Dwolla {
    /// Authorization for Dwolla to debit the bank account later on
    async fn create_on_demand_authorization(&self) -> Result<String> {
        let response = self
            .post(&self.url("/on-demand-authorizations"), &json!({}))
            .await?;
        let links: Links = parse_json(response).await?;
        Ok(links.links.self_.href)
    }

    async fn add_funding_source(
        &self,
        customer_id: &CustomerId,
        processor_token: &ProcessorToken,
        bank_name: &str,
    ) -> Result<Option<FundingSourceUrl>> {
        log::info!("Creating funding source...");
        let on_demand_authorization = self.create_on_demand_authorization().await?;

        let url = self.url(&format!("/customers/{customer_id}/funding-sources"));
        let response = self
            .post(
                &url,
                &json!({
                    "plaidToken": processor_token.0,
                    "name": bank_name,
                    "_links": {
                        "on-demand-authorization": { "href": on_demand_authorization },
                    },
                }),
            )
            .await?;

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|location| location.to_str().ok())
            .map(|location| FundingSourceUrl(location.to_string()));
        log::info!("Creating funding source...done");
        Ok(location)
    }

    async fn remove(&self, funding_source_url: &FundingSourceUrl) -> Result<()> {
        log::info!("Removing funding source {funding_source_url}...");
        self.post(&funding_source_url.0, &json!({ "removed": true }))
            .await?;
        log::info!("Removing funding source {funding_source_url}...done");
        Ok(())
    }
}

#[async_trait]
impl PaymentsProvider for Dwolla {
    async fn create_funding_source(
        &self,
        customer_id: &CustomerId,
        processor_token: &ProcessorToken,
        bank_name: &str,
    ) -> Result<Option<FundingSourceUrl>, ProviderError> {
        self.add_funding_source(customer_id, processor_token, bank_name)
            .await
            .map_err(|err| ProviderError::new(Provider::Dwolla, format!("{err:#}")))
    }

    async fn remove_funding_source(
        &self,
        funding_source_url: &FundingSourceUrl,
    ) -> Result<(), ProviderError> {
        self.remove(funding_source_url)
            .await
            .map_err(|err| ProviderError::new(Provider::Dwolla, format!("{err:#}")))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::super::client::tests::server;
    use super::*;

    async fn mount_on_demand_authorization(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/on-demand-authorizations"))
            .and(header("Authorization", "Bearer dwolla-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_links": {
                    "self": { "href": format!("{}/on-demand-authorizations/auth-1", server.uri()) },
                },
                "bodyText": "I agree that future payments...",
                "buttonText": "Agree & Continue",
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn funding_source_url_is_taken_from_location() {
        let (server, dwolla) = server().await;
        mount_on_demand_authorization(&server).await;
        let funding_source = format!("{}/funding-sources/fs-1", server.uri());
        Mock::given(method("POST"))
            .and(path("/customers/cust_1/funding-sources"))
            .and(header("Content-Type", "application/vnd.dwolla.v1.hal+json"))
            .and(body_json(json!({
                "plaidToken": "processor-sandbox-1",
                "name": "Checking",
                "_links": {
                    "on-demand-authorization": {
                        "href": format!("{}/on-demand-authorizations/auth-1", server.uri()),
                    },
                },
            })))
            .respond_with(ResponseTemplate::new(201).insert_header("Location", funding_source.as_str()))
            .expect(1)
            .mount(&server)
            .await;

        let result = dwolla
            .create_funding_source(
                &CustomerId("cust_1".to_string()),
                &ProcessorToken("processor-sandbox-1".to_string()),
                "Checking",
            )
            .await
            .unwrap();

        assert_eq!(Some(FundingSourceUrl(funding_source)), result);
    }

    #[tokio::test]
    async fn missing_location_is_no_funding_source() {
        let (server, dwolla) = server().await;
        mount_on_demand_authorization(&server).await;
        Mock::given(method("POST"))
            .and(path("/customers/cust_1/funding-sources"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let result = dwolla
            .create_funding_source(
                &CustomerId("cust_1".to_string()),
                &ProcessorToken("processor-sandbox-1".to_string()),
                "Checking",
            )
            .await
            .unwrap();

        assert_eq!(None, result);
    }

    #[tokio::test]
    async fn rejected_funding_source_is_a_dwolla_error() {
        let (server, dwolla) = server().await;
        mount_on_demand_authorization(&server).await;
        Mock::given(method("POST"))
            .and(path("/customers/cust_1/funding-sources"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "DuplicateResource",
                "message": "Bank already exists",
            })))
            .mount(&server)
            .await;

        let error = dwolla
            .create_funding_source(
                &CustomerId("cust_1".to_string()),
                &ProcessorToken("processor-sandbox-1".to_string()),
                "Checking",
            )
            .await
            .unwrap_err();

        assert_eq!(Provider::Dwolla, error.provider);
        assert!(error.message.contains("DuplicateResource"));
    }

    #[tokio::test]
    async fn removal_marks_funding_source_removed() {
        let (server, dwolla) = server().await;
        Mock::given(method("POST"))
            .and(path("/funding-sources/fs-1"))
            .and(body_json(json!({ "removed": true })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "removed": true })))
            .expect(1)
            .mount(&server)
            .await;

        dwolla
            .remove_funding_source(&FundingSourceUrl(format!(
                "{}/funding-sources/fs-1",
                server.uri()
            )))
            .await
            .unwrap();
    }
}
