//! In-memory collaborators for testing code built on the linking workflow.

use anyhow::{bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Mutex;

use crate::cache::ViewCache;
use crate::db::{
    key_from_slice, AccessToken, AccountId, BankAccount, BankAccountId, CustomerId,
    DocumentStore, FundingSourceUrl, ItemId, NewBankAccount, NewUser, User, UserId,
};
use crate::error::{Provider, ProviderError, StoreError, StoreResult};
use crate::journal::{JournalEntry, JournalEvent, LinkJournal};
use crate::link::{
    AccountBalances, ExchangedToken, LinkStep, LinkToken, LinkingProvider, PaymentsProvider,
    Processor, ProcessorToken, ProviderAccount, PublicToken,
};
use crate::sharable_id::SharableIdCodec;

pub fn scenario_user() -> User {
    User {
        id: UserId("user-1".to_string()),
        name: "Jane Doe".to_string(),
        email: "jane@example.com".to_string(),
        dwolla_customer_id: CustomerId("cust_1".to_string()),
        dwolla_customer_url: "https://api-sandbox.dwolla.com/customers/cust_1".to_string(),
    }
}

pub fn provider_account(account_id: &str, name: &str) -> ProviderAccount {
    ProviderAccount {
        account_id: AccountId(account_id.to_string()),
        name: name.to_string(),
        official_name: None,
        mask: Some("0000".to_string()),
        balances: AccountBalances {
            current: Some(Decimal::new(110_00, 2)),
            available: Some(Decimal::new(100_00, 2)),
            iso_currency_code: Some("USD".to_string()),
        },
    }
}

pub fn sharable_id_codec() -> SharableIdCodec {
    SharableIdCodec::with_key(&key_from_slice(&[7; 32]).unwrap())
}

fn mock_failure(provider: Provider) -> ProviderError {
    ProviderError::new(provider, "mock failure")
}

pub struct MockLinkingProvider {
    accounts: Mutex<Vec<ProviderAccount>>,
    processor_token: Mutex<Option<String>>,
    failing_step: Mutex<Option<LinkStep>>,
    exchanged_public_tokens: Mutex<Vec<PublicToken>>,
    processor_token_requests: Mutex<Vec<AccountId>>,
}

impl MockLinkingProvider {
    /// Reports a single "Checking" account `acct-1` for access token `access-1`
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(vec![provider_account("acct-1", "Checking")]),
            processor_token: Mutex::new(None),
            failing_step: Mutex::new(None),
            exchanged_public_tokens: Mutex::new(vec![]),
            processor_token_requests: Mutex::new(vec![]),
        }
    }

    pub fn set_accounts(&self, accounts: Vec<ProviderAccount>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    /// Overrides the default `processor-sandbox-<account id>` token
    pub fn set_processor_token(&self, token: &str) {
        *self.processor_token.lock().unwrap() = Some(token.to_string());
    }

    pub fn fail_at(&self, step: LinkStep) {
        *self.failing_step.lock().unwrap() = Some(step);
    }

    pub fn exchanged_public_tokens(&self) -> Vec<PublicToken> {
        self.exchanged_public_tokens.lock().unwrap().clone()
    }

    pub fn processor_token_requests(&self) -> Vec<AccountId> {
        self.processor_token_requests.lock().unwrap().clone()
    }

    fn check(&self, step: LinkStep) -> Result<(), ProviderError> {
        if *self.failing_step.lock().unwrap() == Some(step) {
            return Err(mock_failure(Provider::Plaid));
        }
        Ok(())
    }
}

#[async_trait]
impl LinkingProvider for MockLinkingProvider {
    async fn create_link_token(&self, user: &User) -> Result<LinkToken, ProviderError> {
        Ok(LinkToken(format!("link-sandbox-{}", user.id)))
    }

    async fn exchange_public_token(
        &self,
        public_token: &PublicToken,
    ) -> Result<ExchangedToken, ProviderError> {
        self.check(LinkStep::TokenExchange)?;
        self.exchanged_public_tokens
            .lock()
            .unwrap()
            .push(public_token.clone());
        Ok(ExchangedToken {
            access_token: AccessToken::new("access-1".to_string()),
            item_id: ItemId("item-1".to_string()),
        })
    }

    async fn get_accounts(
        &self,
        _access_token: &AccessToken,
    ) -> Result<Vec<ProviderAccount>, ProviderError> {
        self.check(LinkStep::AccountFetch)?;
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn create_processor_token(
        &self,
        _access_token: &AccessToken,
        account_id: &AccountId,
        processor: Processor,
    ) -> Result<ProcessorToken, ProviderError> {
        assert_eq!(Processor::Dwolla, processor);
        self.check(LinkStep::ProcessorToken)?;
        self.processor_token_requests
            .lock()
            .unwrap()
            .push(account_id.clone());
        let token = self
            .processor_token
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| format!("processor-sandbox-{account_id}"));
        Ok(ProcessorToken(token))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingSourceRequest {
    pub customer_id: CustomerId,
    pub processor_token: ProcessorToken,
    pub bank_name: String,
}

pub struct MockPaymentsProvider {
    funding_source: Mutex<Option<FundingSourceUrl>>,
    fail_create: Mutex<bool>,
    fail_remove: Mutex<bool>,
    created: Mutex<Vec<FundingSourceRequest>>,
    removed: Mutex<Vec<FundingSourceUrl>>,
}

impl MockPaymentsProvider {
    /// Answers every request with funding source `https://payments/funding/1`
    pub fn new() -> Self {
        Self {
            funding_source: Mutex::new(Some(FundingSourceUrl(
                "https://payments/funding/1".to_string(),
            ))),
            fail_create: Mutex::new(false),
            fail_remove: Mutex::new(false),
            created: Mutex::new(vec![]),
            removed: Mutex::new(vec![]),
        }
    }

    pub fn set_funding_source(&self, funding_source: Option<FundingSourceUrl>) {
        *self.funding_source.lock().unwrap() = funding_source;
    }

    pub fn fail_create(&self) {
        *self.fail_create.lock().unwrap() = true;
    }

    pub fn fail_remove(&self) {
        *self.fail_remove.lock().unwrap() = true;
    }

    pub fn created_funding_sources(&self) -> Vec<FundingSourceRequest> {
        self.created.lock().unwrap().clone()
    }

    pub fn removed_funding_sources(&self) -> Vec<FundingSourceUrl> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentsProvider for MockPaymentsProvider {
    async fn create_funding_source(
        &self,
        customer_id: &CustomerId,
        processor_token: &ProcessorToken,
        bank_name: &str,
    ) -> Result<Option<FundingSourceUrl>, ProviderError> {
        if *self.fail_create.lock().unwrap() {
            return Err(mock_failure(Provider::Dwolla));
        }
        self.created.lock().unwrap().push(FundingSourceRequest {
            customer_id: customer_id.clone(),
            processor_token: processor_token.clone(),
            bank_name: bank_name.to_string(),
        });
        Ok(self.funding_source.lock().unwrap().clone())
    }

    async fn remove_funding_source(
        &self,
        funding_source_url: &FundingSourceUrl,
    ) -> Result<(), ProviderError> {
        if *self.fail_remove.lock().unwrap() {
            return Err(mock_failure(Provider::Dwolla));
        }
        self.removed
            .lock()
            .unwrap()
            .push(funding_source_url.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockDocumentStore {
    users: Mutex<Vec<User>>,
    bank_accounts: Mutex<Vec<BankAccount>>,
    fail_create_bank_account: Mutex<bool>,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create_bank_account(&self) {
        *self.fail_create_bank_account.lock().unwrap() = true;
    }

    pub fn bank_accounts(&self) -> Vec<BankAccount> {
        self.bank_accounts.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut users = self.users.lock().unwrap();
        let user = User::from_new(UserId(format!("user-{}", users.len() + 1)), user);
        users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: &UserId) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| &user.id == id)
            .cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn create_bank_account(&self, account: NewBankAccount) -> StoreResult<BankAccount> {
        if *self.fail_create_bank_account.lock().unwrap() {
            return Err(StoreError::backend(Provider::Appwrite, "mock failure"));
        }
        let mut bank_accounts = self.bank_accounts.lock().unwrap();
        if bank_accounts
            .iter()
            .any(|existing| existing.links_same_account(&account))
        {
            return Err(StoreError::Conflict(account.account_id.to_string()));
        }
        let bank_account = BankAccount::from_new(
            BankAccountId(format!("bank-account-{}", bank_accounts.len() + 1)),
            account,
        );
        bank_accounts.push(bank_account.clone());
        Ok(bank_account)
    }

    async fn list_bank_accounts(&self, user_id: &UserId) -> StoreResult<Vec<BankAccount>> {
        Ok(self
            .bank_accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|account| &account.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_bank_account_by_account_id(
        &self,
        account_id: &AccountId,
    ) -> StoreResult<Option<BankAccount>> {
        Ok(self
            .bank_accounts
            .lock()
            .unwrap()
            .iter()
            .find(|account| &account.account_id == account_id)
            .cloned())
    }
}

#[derive(Default)]
pub struct MockViewCache {
    invalidated: Mutex<Vec<String>>,
}

impl MockViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidated_paths(&self) -> Vec<String> {
        self.invalidated.lock().unwrap().clone()
    }
}

#[async_trait]
impl ViewCache for MockViewCache {
    async fn invalidate(&self, path: &str) {
        self.invalidated.lock().unwrap().push(path.to_string());
    }
}

#[derive(Default)]
pub struct MockLinkJournal {
    entries: Mutex<Vec<JournalEntry>>,
    fail_appends: Mutex<bool>,
}

impl MockLinkJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_appends(&self) {
        *self.fail_appends.lock().unwrap() = true;
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<JournalEvent> {
        self.entries().into_iter().map(|entry| entry.event).collect()
    }
}

#[async_trait]
impl LinkJournal for MockLinkJournal {
    async fn append(&self, entry: JournalEntry) -> Result<()> {
        if *self.fail_appends.lock().unwrap() {
            bail!("mock journal is read-only");
        }
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}
