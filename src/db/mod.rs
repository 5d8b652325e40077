use serde::{Deserialize, Serialize};

mod access_token;
mod bank_account;
mod crypto;
mod database;
mod file;
mod file_store;
mod store;
mod user;

#[derive(Serialize, Deserialize)]
#[cfg_attr(test, derive(PartialEq, Eq, Debug))]
pub enum Database {
    V1(DatabaseV1),
}

pub use access_token::AccessToken;
pub use bank_account::{
    AccountId, BankAccount, BankAccountId, FundingSourceUrl, ItemId, NewBankAccount, SharableId,
    SharedBankAccount,
};
pub use crypto::{key_from_slice, Cipher, XChaCha20Poly1305Cipher, KEY_LEN};
pub use database::DatabaseV1;
pub use file_store::FileDocumentStore;
pub use store::DocumentStore;
pub use user::{extract_customer_id_from_url, CustomerId, NewUser, User, UserId};
