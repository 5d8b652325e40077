use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::error::{LinkError, LinkResult};

/// Progress of one linking run.
///
/// ```text
/// Start -> TokenExchanged -> AccountFetched -> ProcessorTokenMinted -> FundingSourceCreated -> Persisted
/// ```
/// Every non-terminal state may also move to `Failed`. `Failed` and `Persisted` are terminal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Start,
    TokenExchanged,
    AccountFetched,
    ProcessorTokenMinted,
    FundingSourceCreated,
    Persisted,
    Failed,
}

impl LinkState {
    /// The state following this one on the success path
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::TokenExchanged),
            Self::TokenExchanged => Some(Self::AccountFetched),
            Self::AccountFetched => Some(Self::ProcessorTokenMinted),
            Self::ProcessorTokenMinted => Some(Self::FundingSourceCreated),
            Self::FundingSourceCreated => Some(Self::Persisted),
            Self::Persisted | Self::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Persisted | Self::Failed)
    }

    pub fn transition(self, to: Self) -> LinkResult<Self> {
        let allowed = match to {
            Self::Failed => !self.is_terminal(),
            _ => self.next() == Some(to),
        };
        if allowed {
            Ok(to)
        } else {
            Err(LinkError::InvalidTransition { from: self, to })
        }
    }
}

/// The external call a linking run is making. Used to report where a run failed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStep {
    TokenExchange,
    AccountFetch,
    ProcessorToken,
    FundingSource,
    Persistence,
}

impl Display for LinkStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TokenExchange => "Public token exchange",
            Self::AccountFetch => "Account fetch",
            Self::ProcessorToken => "Processor token creation",
            Self::FundingSource => "Funding source creation",
            Self::Persistence => "Bank account persistence",
        };
        f.write_str(name)
    }
}
