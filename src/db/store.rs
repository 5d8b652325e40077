use async_trait::async_trait;

use super::{AccountId, BankAccount, NewBankAccount, NewUser, User, UserId};
use crate::error::StoreResult;

/// Document store holding users and their linked bank accounts.
///
/// Implementations:
/// - [crate::appwrite::Appwrite], the hosted document database
/// - [super::FileDocumentStore], an encrypted local database file
///
/// Stores assign record ids themselves and must reject a second bank account
/// for the same (user, account) pair with [crate::error::StoreError::Conflict].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    async fn get_user(&self, id: &UserId) -> StoreResult<Option<User>>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;

    async fn create_bank_account(&self, account: NewBankAccount) -> StoreResult<BankAccount>;

    async fn list_bank_accounts(&self, user_id: &UserId) -> StoreResult<Vec<BankAccount>>;

    async fn find_bank_account_by_account_id(
        &self,
        account_id: &AccountId,
    ) -> StoreResult<Option<BankAccount>>;
}
