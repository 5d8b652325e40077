use serde::{Deserialize, Serialize};

use super::{BankAccount, User};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseV1 {
    pub users: Vec<User>,
    pub bank_accounts: Vec<BankAccount>,
}

impl DatabaseV1 {
    pub fn new() -> Self {
        Self::default()
    }
}
