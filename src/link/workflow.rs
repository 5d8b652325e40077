use chrono::Utc;
use std::fmt::{self, Display};
use std::sync::Arc;
use uuid::Uuid;

use super::providers::{LinkingProvider, PaymentsProvider, ProviderAccount};
use super::state::{LinkState, LinkStep};
use super::tokens::{Processor, PublicToken};
use crate::cache::ViewCache;
use crate::db::{AccountId, BankAccount, DocumentStore, NewBankAccount, User, UserId};
use crate::error::{LinkError, LinkResult, ProviderError};
use crate::journal::{JournalEntry, JournalEvent, LinkJournal};
use crate::sharable_id::SharableIdCodec;

/// Path whose cached views are stale once a new bank account got linked
pub const INVALIDATED_PATH: &str = "/";

/// Links bank accounts: public token exchange, account fetch, processor token,
/// funding source, persistence.
pub struct LinkWorkflow {
    linking: Arc<dyn LinkingProvider>,
    payments: Arc<dyn PaymentsProvider>,
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn ViewCache>,
    journal: Arc<dyn LinkJournal>,
    codec: SharableIdCodec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOutcome {
    pub run_id: Uuid,
    pub bank_account: BankAccount,
    pub state: LinkState,
}

impl Display for LinkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "publicTokenExchange: Complete")
    }
}

/// Bookkeeping for one invocation of [LinkWorkflow::exchange_public_token]
struct LinkRun {
    id: Uuid,
    user_id: UserId,
    state: LinkState,
}

impl LinkRun {
    fn new(user_id: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            state: LinkState::Start,
        }
    }

    fn advance(&mut self, to: LinkState) -> LinkResult<()> {
        self.state = self.state.transition(to)?;
        log::debug!("[{}] Link state {:?}", self.id, self.state);
        Ok(())
    }

    fn entry(&self, event: JournalEvent) -> JournalEntry {
        JournalEntry {
            run_id: self.id,
            user_id: self.user_id.clone(),
            at: Utc::now(),
            event,
        }
    }
}

impl LinkWorkflow {
    pub fn new(
        linking: Arc<dyn LinkingProvider>,
        payments: Arc<dyn PaymentsProvider>,
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn ViewCache>,
        journal: Arc<dyn LinkJournal>,
        codec: SharableIdCodec,
    ) -> Self {
        Self {
            linking,
            payments,
            store,
            cache,
            journal,
            codec,
        }
    }

    /// Link the bank account behind `public_token` to `user`.
    ///
    /// Either a bank account record was persisted and `Ok` is returned, or nothing was
    /// persisted and the error tells which step failed. A funding source created before
    /// a persistence failure is removed again, or reported in the journal if that fails too.
    pub async fn exchange_public_token(
        &self,
        public_token: &PublicToken,
        user: &User,
    ) -> LinkResult<LinkOutcome> {
        let mut run = LinkRun::new(user.id.clone());
        log::info!("[{}] Linking bank account for user {}...", run.id, user.id);

        match self.run(&mut run, public_token, user).await {
            Ok(bank_account) => {
                log::info!(
                    "[{}] Linking bank account for user {}...done",
                    run.id,
                    user.id
                );
                Ok(LinkOutcome {
                    run_id: run.id,
                    bank_account,
                    state: run.state,
                })
            }
            Err(error) => {
                if let Err(transition_error) = run.advance(LinkState::Failed) {
                    log::warn!("[{}] {transition_error}", run.id);
                }
                if error.is_expected() {
                    log::warn!("[{}] Linking bank account failed: {error}", run.id);
                } else {
                    log::error!("[{}] Linking bank account failed: {error}", run.id);
                }
                self.journal_best_effort(
                    &run,
                    JournalEvent::Failed {
                        step: error.step(),
                        kind: error.kind().to_string(),
                        message: error.to_string(),
                    },
                )
                .await;
                Err(error)
            }
        }
    }

    async fn run(
        &self,
        run: &mut LinkRun,
        public_token: &PublicToken,
        user: &User,
    ) -> LinkResult<BankAccount> {
        if !user.has_customer_id() {
            return Err(LinkError::MissingCustomerId(user.id.clone()));
        }
        self.journal
            .append(run.entry(JournalEvent::Started))
            .await
            .map_err(|err| LinkError::Journal(format!("{err:#}")))?;

        log::info!("[{}] Exchanging public token...", run.id);
        let exchanged = self
            .linking
            .exchange_public_token(public_token)
            .await
            .map_err(upstream(LinkStep::TokenExchange))?;
        run.advance(LinkState::TokenExchanged)?;

        log::info!("[{}] Requesting accounts...", run.id);
        let accounts = self
            .linking
            .get_accounts(&exchanged.access_token)
            .await
            .map_err(upstream(LinkStep::AccountFetch))?;
        let num_accounts = accounts.len();
        let account = select_account(accounts).ok_or(LinkError::EmptyResult {
            step: LinkStep::AccountFetch,
        })?;
        if num_accounts > 1 {
            log::info!(
                "[{}] Item has {num_accounts} accounts, linking the first one ({})",
                run.id,
                account.account_id
            );
        }
        self.ensure_not_linked(&user.id, &account.account_id).await?;
        let sharable_id = self.codec.encode(&account.account_id)?;
        run.advance(LinkState::AccountFetched)?;

        log::info!("[{}] Creating processor token...", run.id);
        let processor_token = self
            .linking
            .create_processor_token(
                &exchanged.access_token,
                &account.account_id,
                Processor::Dwolla,
            )
            .await
            .map_err(upstream(LinkStep::ProcessorToken))?;
        if processor_token.is_empty() {
            return Err(LinkError::EmptyResult {
                step: LinkStep::ProcessorToken,
            });
        }
        run.advance(LinkState::ProcessorTokenMinted)?;

        log::info!("[{}] Creating funding source...", run.id);
        let funding_source_url = self
            .payments
            .create_funding_source(&user.dwolla_customer_id, &processor_token, &account.name)
            .await
            .map_err(upstream(LinkStep::FundingSource))?
            .filter(|url| !url.0.trim().is_empty())
            .ok_or(LinkError::EmptyResult {
                step: LinkStep::FundingSource,
            })?;
        run.advance(LinkState::FundingSourceCreated)?;
        self.journal_best_effort(
            run,
            JournalEvent::FundingSourceCreated {
                account_id: account.account_id.clone(),
                funding_source_url: funding_source_url.clone(),
            },
        )
        .await;

        log::info!("[{}] Saving bank account...", run.id);
        let bank_account = self
            .persist(
                run,
                NewBankAccount {
                    user_id: user.id.clone(),
                    bank_id: exchanged.item_id,
                    account_id: account.account_id,
                    access_token: exchanged.access_token,
                    funding_source_url,
                    sharable_id,
                },
            )
            .await?;
        run.advance(LinkState::Persisted)?;
        self.journal_best_effort(
            run,
            JournalEvent::Persisted {
                bank_account_id: bank_account.id.clone(),
            },
        )
        .await;

        self.cache.invalidate(INVALIDATED_PATH).await;

        Ok(bank_account)
    }

    async fn ensure_not_linked(&self, user_id: &UserId, account_id: &AccountId) -> LinkResult<()> {
        let existing = self
            .store
            .list_bank_accounts(user_id)
            .await
            .map_err(LinkError::Lookup)?;
        if existing
            .iter()
            .any(|account| &account.account_id == account_id)
        {
            return Err(LinkError::DuplicateAccount {
                user_id: user_id.clone(),
                account_id: account_id.clone(),
            });
        }
        Ok(())
    }

    async fn persist(&self, run: &LinkRun, record: NewBankAccount) -> LinkResult<BankAccount> {
        let funding_source_url = record.funding_source_url.clone();
        let source = match self.store.create_bank_account(record).await {
            Ok(bank_account) => return Ok(bank_account),
            Err(source) => source,
        };

        log::error!(
            "[{}] Failed to save bank account, removing funding source {funding_source_url}: {source}",
            run.id
        );
        let compensated = match self
            .payments
            .remove_funding_source(&funding_source_url)
            .await
        {
            Ok(()) => {
                self.journal_best_effort(
                    run,
                    JournalEvent::Compensated {
                        funding_source_url: funding_source_url.clone(),
                    },
                )
                .await;
                true
            }
            Err(err) => {
                log::error!(
                    "[{}] Failed to remove funding source {funding_source_url}, it needs manual cleanup: {err}",
                    run.id
                );
                false
            }
        };
        Err(LinkError::Persistence {
            funding_source_url,
            compensated,
            source,
        })
    }

    /// Journal entries after the first side effect must not abort the run
    async fn journal_best_effort(&self, run: &LinkRun, event: JournalEvent) {
        if let Err(err) = self.journal.append(run.entry(event)).await {
            log::warn!("[{}] Failed to write link journal: {err:#}", run.id);
        }
    }
}

/// Picks the account to link. Always the first one the provider reported;
/// items with several accounts aren't disambiguated.
fn select_account(accounts: Vec<ProviderAccount>) -> Option<ProviderAccount> {
    accounts.into_iter().next()
}

fn upstream(step: LinkStep) -> impl FnOnce(ProviderError) -> LinkError {
    move |source| LinkError::UpstreamRequest { step, source }
}
