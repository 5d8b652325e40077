//! Seams to the external services the linking workflow talks to.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::tokens::{ExchangedToken, LinkToken, Processor, ProcessorToken, PublicToken};
use crate::db::{AccessToken, AccountId, CustomerId, FundingSourceUrl, User};
use crate::error::ProviderError;

/// Account metadata as reported by the linking provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAccount {
    pub account_id: AccountId,
    pub name: String,
    pub official_name: Option<String>,
    pub mask: Option<String>,
    pub balances: AccountBalances,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountBalances {
    pub current: Option<Decimal>,
    pub available: Option<Decimal>,
    pub iso_currency_code: Option<String>,
}

/// Bank-account-linking provider (Plaid)
#[async_trait]
pub trait LinkingProvider: Send + Sync {
    /// Create the token that starts a Link session for `user`
    async fn create_link_token(&self, user: &User) -> Result<LinkToken, ProviderError>;

    async fn exchange_public_token(
        &self,
        public_token: &PublicToken,
    ) -> Result<ExchangedToken, ProviderError>;

    /// Accounts of the item, in the order the provider reports them
    async fn get_accounts(
        &self,
        access_token: &AccessToken,
    ) -> Result<Vec<ProviderAccount>, ProviderError>;

    async fn create_processor_token(
        &self,
        access_token: &AccessToken,
        account_id: &AccountId,
        processor: Processor,
    ) -> Result<ProcessorToken, ProviderError>;
}

/// Payments provider (Dwolla)
#[async_trait]
pub trait PaymentsProvider: Send + Sync {
    /// Returns `Ok(None)` if the provider accepted the request but didn't return a funding source
    async fn create_funding_source(
        &self,
        customer_id: &CustomerId,
        processor_token: &ProcessorToken,
        bank_name: &str,
    ) -> Result<Option<FundingSourceUrl>, ProviderError>;

    async fn remove_funding_source(
        &self,
        funding_source_url: &FundingSourceUrl,
    ) -> Result<(), ProviderError>;
}
