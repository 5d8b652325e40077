use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    crypto::XChaCha20Poly1305Cipher,
    database::DatabaseV1,
    file, AccountId, BankAccount, BankAccountId, DocumentStore, NewBankAccount, NewUser, User,
    UserId,
};
use crate::error::{Provider, StoreError, StoreResult};

/// [DocumentStore] backed by an encrypted database file on the local disk.
///
/// Every operation loads the file, applies the change and writes it back.
/// Writes are serialized through a lock so concurrent link runs within one
/// process can't lose each other's records.
pub struct FileDocumentStore {
    path: PathBuf,
    cipher: XChaCha20Poly1305Cipher,
    lock: Mutex<()>,
}

impl FileDocumentStore {
    /// Opens an existing database file
    pub async fn open(path: &Path, cipher: XChaCha20Poly1305Cipher) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            bail!(
                "Database file {} not found. Run `quentis-link init` first.",
                path.display()
            );
        }
        Ok(Self::new(path, cipher))
    }

    /// Creates a new, empty database file. Fails if the file already exists.
    pub async fn create(path: &Path, cipher: XChaCha20Poly1305Cipher) -> Result<Self> {
        if tokio::fs::try_exists(path).await? {
            bail!("Database {} already exists", path.display());
        }
        file::save(DatabaseV1::new(), path, &cipher).await?;
        Ok(Self::new(path, cipher))
    }

    fn new(path: &Path, cipher: XChaCha20Poly1305Cipher) -> Self {
        Self {
            path: path.to_path_buf(),
            cipher,
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> StoreResult<DatabaseV1> {
        file::load(&self.path, &self.cipher)
            .await
            .map_err(backend_error)?
            .ok_or_else(|| {
                StoreError::backend(
                    Provider::LocalDatabase,
                    format!("Database file {} disappeared", self.path.display()),
                )
            })
    }

    async fn modify<R>(
        &self,
        modify_fn: impl FnOnce(&mut DatabaseV1) -> StoreResult<R> + Send,
    ) -> StoreResult<R> {
        let _guard = self.lock.lock().await;
        let mut db = self.read().await?;
        let result = modify_fn(&mut db)?;
        file::save(db, &self.path, &self.cipher)
            .await
            .map_err(backend_error)?;
        Ok(result)
    }
}

fn backend_error(error: anyhow::Error) -> StoreError {
    StoreError::backend(Provider::LocalDatabase, format!("{error:#}"))
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.modify(move |db| {
            if db
                .users
                .iter()
                .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
            {
                return Err(StoreError::Conflict(format!(
                    "User with email {} already exists",
                    user.email
                )));
            }
            let user = User::from_new(UserId(new_id()), user);
            db.users.push(user.clone());
            Ok(user)
        })
        .await
    }

    async fn get_user(&self, id: &UserId) -> StoreResult<Option<User>> {
        let _guard = self.lock.lock().await;
        let db = self.read().await?;
        Ok(db.users.into_iter().find(|user| &user.id == id))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.users)
    }

    async fn create_bank_account(&self, account: NewBankAccount) -> StoreResult<BankAccount> {
        self.modify(move |db| {
            if db
                .bank_accounts
                .iter()
                .any(|existing| existing.links_same_account(&account))
            {
                return Err(StoreError::Conflict(format!(
                    "Account {} is already linked for user {}",
                    account.account_id, account.user_id
                )));
            }
            let account = BankAccount::from_new(BankAccountId(new_id()), account);
            db.bank_accounts.push(account.clone());
            Ok(account)
        })
        .await
    }

    async fn list_bank_accounts(&self, user_id: &UserId) -> StoreResult<Vec<BankAccount>> {
        let _guard = self.lock.lock().await;
        let db = self.read().await?;
        Ok(db
            .bank_accounts
            .into_iter()
            .filter(|account| &account.user_id == user_id)
            .collect())
    }

    async fn find_bank_account_by_account_id(
        &self,
        account_id: &AccountId,
    ) -> StoreResult<Option<BankAccount>> {
        let _guard = self.lock.lock().await;
        let db = self.read().await?;
        Ok(db
            .bank_accounts
            .into_iter()
            .find(|account| &account.account_id == account_id))
    }
}
