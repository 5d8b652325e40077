use anyhow::{anyhow, Result};
use rust_decimal::{prelude::FromPrimitive as _, Decimal};

use super::client::Plaid;
use crate::db::{AccessToken, AccountId};
use crate::link::{AccountBalances, ProviderAccount};

pub(super) async fn get_accounts(
    client: &Plaid,
    access_token: &AccessToken,
) -> Result<Vec<ProviderAccount>> {
    log::info!("Requesting accounts...");

    let response = client.client().accounts_get(access_token.get()).await?;
    let result = response
        .accounts
        .into_iter()
        .map(|account| {
            Ok(ProviderAccount {
                account_id: AccountId(account.account_id),
                name: account.name,
                official_name: account.official_name,
                mask: account.mask,
                balances: AccountBalances {
                    current: account.balances.current.map(to_amount).transpose()?,
                    available: account.balances.available.map(to_amount).transpose()?,
                    iso_currency_code: account.balances.iso_currency_code,
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    log::info!("Requesting accounts...done");
    Ok(result)
}

/// Plaid reports balances as floats. Round them to cents.
fn to_amount(amount: f64) -> Result<Decimal> {
    Decimal::from_f64(amount)
        .map(|amount| amount.round_dp(2))
        .ok_or_else(|| anyhow!("Plaid returned an invalid amount: {amount}"))
}
