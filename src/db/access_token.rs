use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

/// Durable Plaid access token for one linked item. This is a secret and is never printed.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessToken {
    access_token: String,
}

impl AccessToken {
    pub fn new(access_token: String) -> AccessToken {
        AccessToken { access_token }
    }

    pub fn get(&self) -> &str {
        &self.access_token
    }
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessToken(*****)")
    }
}
