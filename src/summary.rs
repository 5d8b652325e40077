//! Balances of all bank accounts a user linked, as shown on the dashboard.

use anyhow::{Context as _, Result};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::{BankAccount, BankAccountId, DocumentStore, SharableId, UserId};
use crate::link::{LinkingProvider, ProviderAccount};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub id: BankAccountId,
    pub sharable_id: SharableId,
    pub name: String,
    pub official_name: Option<String>,
    pub mask: Option<String>,
    pub current_balance: Decimal,
    pub available_balance: Option<Decimal>,
    pub iso_currency_code: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountsSummary {
    pub total_banks: usize,
    pub total_current_balance: Decimal,
    pub accounts: Vec<AccountBalance>,
}

impl AccountsSummary {
    pub fn new(accounts: Vec<AccountBalance>) -> Self {
        Self {
            total_banks: accounts.len(),
            total_current_balance: accounts
                .iter()
                .map(|account| account.current_balance)
                .sum(),
            accounts,
        }
    }
}

/// Fetch current balances for every bank account of `user_id`.
///
/// Accounts the provider doesn't report anymore are left out of the summary.
pub async fn summarize(
    linking: &dyn LinkingProvider,
    store: &dyn DocumentStore,
    user_id: &UserId,
) -> Result<AccountsSummary> {
    let bank_accounts = store
        .list_bank_accounts(user_id)
        .await
        .context("Failed to load bank accounts")?;

    let mut balances = Vec::with_capacity(bank_accounts.len());
    for bank_account in &bank_accounts {
        let accounts = linking
            .get_accounts(&bank_account.access_token)
            .await
            .with_context(|| format!("Failed to load balances for {}", bank_account.id))?;
        match accounts
            .into_iter()
            .find(|account| account.account_id == bank_account.account_id)
        {
            Some(account) => balances.push(account_balance(bank_account, account)),
            None => log::warn!(
                "Bank account {} isn't reported by Plaid anymore",
                bank_account.id
            ),
        }
    }
    Ok(AccountsSummary::new(balances))
}

fn account_balance(bank_account: &BankAccount, account: ProviderAccount) -> AccountBalance {
    AccountBalance {
        id: bank_account.id.clone(),
        sharable_id: bank_account.sharable_id.clone(),
        name: account.name,
        official_name: account.official_name,
        mask: account.mask,
        current_balance: account.balances.current.unwrap_or(Decimal::ZERO),
        available_balance: account.balances.available,
        iso_currency_code: account.balances.iso_currency_code,
    }
}

/// US dollar formatting with thousands separators, e.g. `$1,234.56` or `-$12.00`
pub fn format_amount(amount: Decimal) -> String {
    let amount = amount.round_dp(2);
    let sign = if amount.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    let digits = format!("{:.2}", amount.abs());
    let (whole, cents) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{sign}${grouped}.{cents}")
}
