use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::{Appwrite, Collection, Query};
use crate::db::{
    AccessToken, AccountId, BankAccount, BankAccountId, CustomerId, DocumentStore,
    FundingSourceUrl, ItemId, NewBankAccount, NewUser, SharableId, User, UserId,
};
use crate::error::{StoreError, StoreResult};

#[derive(Deserialize)]
struct Document<T> {
    #[serde(rename = "$id")]
    id: String,
    #[serde(flatten)]
    data: T,
}

#[derive(Deserialize)]
struct DocumentList<T> {
    documents: Vec<Document<T>>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDocument {
    name: String,
    email: String,
    dwolla_customer_id: String,
    dwolla_customer_url: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BankAccountDocument {
    user_id: String,
    bank_id: String,
    account_id: String,
    access_token: String,
    funding_source_url: String,
    sharable_id: String,
}

impl From<NewUser> for UserDocument {
    fn from(user: NewUser) -> Self {
        Self {
            name: user.name,
            email: user.email,
            dwolla_customer_id: user.dwolla_customer_id.0,
            dwolla_customer_url: user.dwolla_customer_url,
        }
    }
}

impl From<Document<UserDocument>> for User {
    fn from(document: Document<UserDocument>) -> Self {
        Self {
            id: UserId(document.id),
            name: document.data.name,
            email: document.data.email,
            dwolla_customer_id: CustomerId(document.data.dwolla_customer_id),
            dwolla_customer_url: document.data.dwolla_customer_url,
        }
    }
}

impl From<NewBankAccount> for BankAccountDocument {
    fn from(account: NewBankAccount) -> Self {
        Self {
            user_id: account.user_id.0,
            bank_id: account.bank_id.0,
            account_id: account.account_id.0,
            access_token: account.access_token.get().to_string(),
            funding_source_url: account.funding_source_url.0,
            sharable_id: account.sharable_id.0,
        }
    }
}

impl From<Document<BankAccountDocument>> for BankAccount {
    fn from(document: Document<BankAccountDocument>) -> Self {
        let data = document.data;
        Self {
            id: BankAccountId(document.id),
            user_id: UserId(data.user_id),
            bank_id: ItemId(data.bank_id),
            account_id: AccountId(data.account_id),
            access_token: AccessToken::new(data.access_token),
            funding_source_url: FundingSourceUrl(data.funding_source_url),
            sharable_id: SharableId(data.sharable_id),
        }
    }
}

#[async_trait]
impl DocumentStore for Appwrite {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let document: Document<UserDocument> = self
            .create_document(Collection::Users, &UserDocument::from(user))
            .await?;
        Ok(document.into())
    }

    async fn get_user(&self, id: &UserId) -> StoreResult<Option<User>> {
        let document: Option<Document<UserDocument>> =
            self.get_document(Collection::Users, &id.0).await?;
        Ok(document.map(User::from))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let list: DocumentList<UserDocument> =
            self.list_documents(Collection::Users, &[]).await?;
        Ok(list.documents.into_iter().map(User::from).collect())
    }

    async fn create_bank_account(&self, account: NewBankAccount) -> StoreResult<BankAccount> {
        let existing: DocumentList<BankAccountDocument> = self
            .list_documents(
                Collection::BankAccounts,
                &[
                    Query::equal("userId", account.user_id.0.as_str()),
                    Query::equal("accountId", account.account_id.0.as_str()),
                ],
            )
            .await?;
        if !existing.documents.is_empty() {
            return Err(StoreError::Conflict(format!(
                "Bank account {} for user {}",
                account.account_id, account.user_id
            )));
        }
        let document: Document<BankAccountDocument> = self
            .create_document(
                Collection::BankAccounts,
                &BankAccountDocument::from(account),
            )
            .await?;
        Ok(document.into())
    }

    async fn list_bank_accounts(&self, user_id: &UserId) -> StoreResult<Vec<BankAccount>> {
        let list: DocumentList<BankAccountDocument> = self
            .list_documents(
                Collection::BankAccounts,
                &[Query::equal("userId", user_id.0.as_str())],
            )
            .await?;
        Ok(list.documents.into_iter().map(BankAccount::from).collect())
    }

    async fn find_bank_account_by_account_id(
        &self,
        account_id: &AccountId,
    ) -> StoreResult<Option<BankAccount>> {
        let list: DocumentList<BankAccountDocument> = self
            .list_documents(
                Collection::BankAccounts,
                &[Query::equal("accountId", account_id.0.as_str())],
            )
            .await?;
        Ok(list.documents.into_iter().next().map(BankAccount::from))
    }
}
