use async_trait::async_trait;
use plaid::{PlaidAuth, PlaidClient};

use super::{accounts, link_account, processor_token};
use crate::config::PlaidConfig;
use crate::db::{AccessToken, AccountId, User};
use crate::error::{Provider, ProviderError};
use crate::link::{
    ExchangedToken, LinkToken, LinkingProvider, Processor, ProcessorToken, ProviderAccount,
    PublicToken,
};

const PLAID_VERSION: &str = "2020-09-14";

/// Plaid API client. The Plaid environment (sandbox, development, production) is taken from `PLAID_ENV`.
pub struct Plaid {
    client: PlaidClient,
}

impl Plaid {
    pub fn new(config: &PlaidConfig) -> Plaid {
        Plaid {
            client: PlaidClient::with_auth(PlaidAuth::ClientId {
                client_id: config.client_id.clone(),
                secret: config.secret.clone(),
                plaid_version: PLAID_VERSION.to_string(),
            }),
        }
    }

    pub(super) fn client(&self) -> &PlaidClient {
        &self.client
    }
}

fn plaid_error(err: anyhow::Error) -> ProviderError {
    ProviderError::new(Provider::Plaid, format!("{err:#}"))
}

#[async_trait]
impl LinkingProvider for Plaid {
    async fn create_link_token(&self, user: &User) -> Result<LinkToken, ProviderError> {
        link_account::link_token_create(self, &user.name, &user.id.0)
            .await
            .map_err(plaid_error)
    }

    async fn exchange_public_token(
        &self,
        public_token: &PublicToken,
    ) -> Result<ExchangedToken, ProviderError> {
        link_account::exchange_public_token(self, public_token)
            .await
            .map_err(plaid_error)
    }

    async fn get_accounts(
        &self,
        access_token: &AccessToken,
    ) -> Result<Vec<ProviderAccount>, ProviderError> {
        accounts::get_accounts(self, access_token)
            .await
            .map_err(plaid_error)
    }

    async fn create_processor_token(
        &self,
        access_token: &AccessToken,
        account_id: &AccountId,
        processor: Processor,
    ) -> Result<ProcessorToken, ProviderError> {
        processor_token::create_processor_token(self, access_token, account_id, processor)
            .await
            .map_err(plaid_error)
    }
}
