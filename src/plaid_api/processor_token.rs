use anyhow::Result;

use super::client::Plaid;
use crate::db::{AccessToken, AccountId};
use crate::link::{Processor, ProcessorToken};

/// Mint a token that lets `processor` access `account_id` without seeing the access token
pub(super) async fn create_processor_token(
    client: &Plaid,
    access_token: &AccessToken,
    account_id: &AccountId,
    processor: Processor,
) -> Result<ProcessorToken> {
    log::info!("Creating {} processor token...", processor.as_str());

    let response = client
        .client()
        .processor_token_create(access_token.get(), &account_id.0, processor.as_str())
        .await?;

    log::info!("Creating {} processor token...done", processor.as_str());
    Ok(ProcessorToken(response.processor_token))
}
