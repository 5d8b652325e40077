mod providers;
mod state;
mod tokens;
mod workflow;

pub use providers::{AccountBalances, LinkingProvider, PaymentsProvider, ProviderAccount};
pub use state::{LinkState, LinkStep};
pub use tokens::{ExchangedToken, LinkToken, Processor, ProcessorToken, PublicToken};
pub use workflow::{LinkOutcome, LinkWorkflow, INVALIDATED_PATH};
