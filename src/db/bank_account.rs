use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use super::{AccessToken, UserId};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Plaid account id
    AccountId
);
string_id!(
    /// Plaid item id, one per linked institution login
    ItemId
);
string_id!(
    /// Reference to the funding source at Dwolla
    FundingSourceUrl
);
string_id!(
    /// Reversible keyed encoding of an [AccountId] that is safe to hand out to clients
    SharableId
);
string_id!(BankAccountId);

/// Bank account record as created by the linking workflow. Immutable once stored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BankAccount {
    pub id: BankAccountId,
    pub user_id: UserId,
    pub bank_id: ItemId,
    pub account_id: AccountId,
    pub access_token: AccessToken,
    pub funding_source_url: FundingSourceUrl,
    pub sharable_id: SharableId,
}

impl BankAccount {
    pub fn from_new(id: BankAccountId, account: NewBankAccount) -> Self {
        let NewBankAccount {
            user_id,
            bank_id,
            account_id,
            access_token,
            funding_source_url,
            sharable_id,
        } = account;
        Self {
            id,
            user_id,
            bank_id,
            account_id,
            access_token,
            funding_source_url,
            sharable_id,
        }
    }

    /// Same (user, account) pair. Stores use this to reject duplicate links.
    pub fn links_same_account(&self, other: &NewBankAccount) -> bool {
        self.user_id == other.user_id && self.account_id == other.account_id
    }

    pub fn to_shared(&self) -> SharedBankAccount {
        SharedBankAccount {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            bank_id: self.bank_id.clone(),
            sharable_id: self.sharable_id.clone(),
            funding_source_url: self.funding_source_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBankAccount {
    pub user_id: UserId,
    pub bank_id: ItemId,
    pub account_id: AccountId,
    pub access_token: AccessToken,
    pub funding_source_url: FundingSourceUrl,
    pub sharable_id: SharableId,
}

/// Client-facing view of a bank account, without the access token or the raw account id
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SharedBankAccount {
    pub id: BankAccountId,
    pub user_id: UserId,
    pub bank_id: ItemId,
    pub sharable_id: SharableId,
    pub funding_source_url: FundingSourceUrl,
}
