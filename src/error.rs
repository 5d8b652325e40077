//! Error types shared by the linking workflow and its collaborators.

use std::fmt::{self, Display};

use thiserror::Error;

use crate::db::{AccountId, FundingSourceUrl, UserId};
use crate::link::{LinkState, LinkStep};

/// The external service a request was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Plaid,
    Dwolla,
    Appwrite,
    LocalDatabase,
}

impl Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Plaid => "Plaid",
            Self::Dwolla => "Dwolla",
            Self::Appwrite => "Appwrite",
            Self::LocalDatabase => "local database",
        };
        f.write_str(name)
    }
}

/// A request to the linking or payments provider failed.
#[derive(Error, Debug)]
#[error("{provider} request failed: {message}")]
pub struct ProviderError {
    pub provider: Provider,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: Provider, message: impl Display) -> Self {
        Self {
            provider,
            message: message.to_string(),
        }
    }
}

/// Document store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A record with the same identity already exists
    #[error("Record already exists: {0}")]
    Conflict(String),

    #[error("{backend} error: {message}")]
    Backend { backend: Provider, message: String },
}

impl StoreError {
    pub fn backend(backend: Provider, message: impl Display) -> Self {
        Self::Backend {
            backend,
            message: message.to_string(),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Everything that can go wrong while linking a bank account.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The user was created without a payments-provider customer
    #[error("User {0} has no Dwolla customer id")]
    MissingCustomerId(UserId),

    /// An upstream call failed (network, auth, rate limit, ...)
    #[error("{step} failed: {source}")]
    UpstreamRequest {
        step: LinkStep,
        #[source]
        source: ProviderError,
    },

    /// An upstream call succeeded but returned nothing usable
    #[error("{step} returned an empty result")]
    EmptyResult { step: LinkStep },

    /// The account is already linked for this user
    #[error("Account {account_id} is already linked for user {user_id}")]
    DuplicateAccount {
        user_id: UserId,
        account_id: AccountId,
    },

    /// Writing the bank account record failed after the funding source was created.
    /// `compensated` tells whether the funding source was removed again.
    #[error("Failed to persist bank account for funding source {funding_source_url} (compensated: {compensated}): {source}")]
    Persistence {
        funding_source_url: FundingSourceUrl,
        compensated: bool,
        #[source]
        source: StoreError,
    },

    /// A document store read needed before the first side effect failed
    #[error("Document store lookup failed: {0}")]
    Lookup(#[source] StoreError),

    /// The link journal could not record the start of a run
    #[error("Failed to write link journal: {0}")]
    Journal(String),

    #[error("Invalid sharable id: {0}")]
    Encoding(String),

    #[error("Invalid link state transition from {from:?} to {to:?}")]
    InvalidTransition { from: LinkState, to: LinkState },
}

impl LinkError {
    /// Whether the error is caused by the caller's input rather than by a broken dependency.
    ///
    /// Expected errors are logged at `warn`, everything else at `error`.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::MissingCustomerId(_) | Self::DuplicateAccount { .. } | Self::Encoding(_) => true,
            Self::UpstreamRequest { .. }
            | Self::EmptyResult { .. }
            | Self::Persistence { .. }
            | Self::Lookup(_)
            | Self::Journal(_)
            | Self::InvalidTransition { .. } => false,
        }
    }

    /// Short machine-readable name of the error kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCustomerId(_) => "missing_customer_id",
            Self::UpstreamRequest { .. } => "upstream_request_failure",
            Self::EmptyResult { .. } => "empty_result_failure",
            Self::DuplicateAccount { .. } => "duplicate_account",
            Self::Persistence { .. } => "persistence_failure",
            Self::Lookup(_) => "lookup_failure",
            Self::Journal(_) => "journal_failure",
            Self::Encoding(_) => "encoding_failure",
            Self::InvalidTransition { .. } => "invalid_transition",
        }
    }

    /// The step of the run that failed, if the error belongs to one
    #[must_use]
    pub fn step(&self) -> Option<LinkStep> {
        match self {
            Self::UpstreamRequest { step, .. } | Self::EmptyResult { step } => Some(*step),
            Self::Persistence { .. } => Some(LinkStep::Persistence),
            Self::MissingCustomerId(_)
            | Self::DuplicateAccount { .. }
            | Self::Lookup(_)
            | Self::Journal(_)
            | Self::Encoding(_)
            | Self::InvalidTransition { .. } => None,
        }
    }
}

pub type LinkResult<T> = std::result::Result<T, LinkError>;
