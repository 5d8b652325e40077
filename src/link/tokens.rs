use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

use crate::db::{AccessToken, ItemId};

/// Token used to initialize Plaid Link in the browser
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LinkToken(pub String);

/// Short-lived, single-use token handed back by Plaid Link after the user linked an account
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicToken(pub String);

/// One-time credential that hands a linked account over to the payments provider
#[derive(Clone, PartialEq, Eq)]
pub struct ProcessorToken(pub String);

impl ProcessorToken {
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Debug for ProcessorToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProcessorToken(*****)")
    }
}

/// Result of exchanging a [PublicToken]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangedToken {
    pub access_token: AccessToken,
    pub item_id: ItemId,
}

/// Payments rails a processor token can be minted for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processor {
    Dwolla,
}

impl Processor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dwolla => "dwolla",
        }
    }
}
