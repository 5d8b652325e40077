//! Append-only journal of linking runs.
//!
//! Every run writes `Started` before its first external side effect. Runs that may
//! have left a funding source at the payments provider without a bank account
//! record are reported by [unreconciled] so they can be repaired by hand.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt as _;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::{AccountId, BankAccountId, FundingSourceUrl, UserId};
use crate::link::LinkStep;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub run_id: Uuid,
    pub user_id: UserId,
    pub at: DateTime<Utc>,
    pub event: JournalEvent,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalEvent {
    Started,
    FundingSourceCreated {
        account_id: AccountId,
        funding_source_url: FundingSourceUrl,
    },
    Persisted {
        bank_account_id: BankAccountId,
    },
    Compensated {
        funding_source_url: FundingSourceUrl,
    },
    Failed {
        #[serde(default)]
        step: Option<LinkStep>,
        kind: String,
        message: String,
    },
}

#[async_trait]
pub trait LinkJournal: Send + Sync {
    async fn append(&self, entry: JournalEntry) -> Result<()>;
}

/// [LinkJournal] writing one JSON object per line
pub struct FileLinkJournal {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLinkJournal {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// Returns all entries in the order they were written. A missing journal file is empty.
    pub async fn read_all(&self) -> Result<Vec<JournalEntry>> {
        let _guard = self.lock.lock().await;
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(vec![]);
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Invalid journal entry on line {}", index + 1))
            })
            .collect()
    }
}

#[async_trait]
impl LinkJournal for FileLinkJournal {
    async fn append(&self, entry: JournalEntry) -> Result<()> {
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open journal {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// A run that may have left a funding source behind without a bank account record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreconciledRun {
    pub run_id: Uuid,
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    pub issue: RunIssue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunIssue {
    /// The funding source was created but neither persisted nor removed again
    OrphanedFundingSource {
        account_id: AccountId,
        funding_source_url: FundingSourceUrl,
    },
    /// The run never recorded an outcome, e.g. because the process died or is still running
    Incomplete,
    /// Creating the funding source failed in transit. The payments provider may have
    /// created it anyway.
    Ambiguous { step: LinkStep, message: String },
}

#[derive(Default)]
struct RunProgress {
    user_id: Option<UserId>,
    started_at: Option<DateTime<Utc>>,
    funding_source: Option<(AccountId, FundingSourceUrl)>,
    reconciled: bool,
    failure: Option<(Option<LinkStep>, String, String)>,
}

impl RunProgress {
    fn issue(self) -> Option<RunIssue> {
        if self.reconciled {
            return None;
        }
        if let Some((account_id, funding_source_url)) = self.funding_source {
            return Some(RunIssue::OrphanedFundingSource {
                account_id,
                funding_source_url,
            });
        }
        match self.failure {
            None => Some(RunIssue::Incomplete),
            Some((Some(step @ LinkStep::FundingSource), kind, message))
                if kind == "upstream_request_failure" =>
            {
                Some(RunIssue::Ambiguous { step, message })
            }
            // The funding source entry is best effort, the failure tells us it was created.
            Some((Some(step @ LinkStep::Persistence), _, message)) => {
                Some(RunIssue::Ambiguous { step, message })
            }
            Some(_) => None,
        }
    }
}

/// Runs whose outcome at the payments provider needs a manual check, in the order they started
pub fn unreconciled(entries: &[JournalEntry]) -> Vec<UnreconciledRun> {
    let mut runs: HashMap<Uuid, RunProgress> = HashMap::new();
    let mut order = Vec::new();
    for entry in entries {
        let run = runs.entry(entry.run_id).or_insert_with(|| {
            order.push(entry.run_id);
            RunProgress::default()
        });
        run.user_id.get_or_insert_with(|| entry.user_id.clone());
        run.started_at.get_or_insert(entry.at);
        match &entry.event {
            JournalEvent::Started => {}
            JournalEvent::FundingSourceCreated {
                account_id,
                funding_source_url,
            } => {
                run.funding_source = Some((account_id.clone(), funding_source_url.clone()));
            }
            JournalEvent::Persisted { .. } | JournalEvent::Compensated { .. } => {
                run.reconciled = true;
            }
            JournalEvent::Failed {
                step,
                kind,
                message,
            } => {
                run.failure = Some((*step, kind.clone(), message.clone()));
            }
        }
    }
    order
        .into_iter()
        .filter_map(|run_id| {
            let run = runs.remove(&run_id)?;
            let user_id = run.user_id.clone()?;
            let started_at = run.started_at?;
            Some(UnreconciledRun {
                run_id,
                user_id,
                started_at,
                issue: run.issue()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(run_id: Uuid, event: JournalEvent) -> JournalEntry {
        JournalEntry {
            run_id,
            user_id: UserId("user-1".to_string()),
            at: Utc::now(),
            event,
        }
    }

    fn failed(step: LinkStep, kind: &str) -> JournalEvent {
        JournalEvent::Failed {
            step: Some(step),
            kind: kind.to_string(),
            message: "request failed".to_string(),
        }
    }

    fn funding_source_created(url: &str) -> JournalEvent {
        JournalEvent::FundingSourceCreated {
            account_id: AccountId("acct-1".to_string()),
            funding_source_url: FundingSourceUrl(url.to_string()),
        }
    }

    #[tokio::test]
    async fn missing_journal_is_empty() {
        let tempdir = tempfile::tempdir().unwrap();
        let journal = FileLinkJournal::new(&tempdir.path().join("journal.jsonl"));
        assert!(journal.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn appended_entries_are_read_back_in_order() {
        let tempdir = tempfile::tempdir().unwrap();
        let journal = FileLinkJournal::new(&tempdir.path().join("journal.jsonl"));
        let run_id = Uuid::new_v4();
        let entries = vec![
            entry(run_id, JournalEvent::Started),
            entry(run_id, funding_source_created("https://payments/funding/1")),
            entry(
                run_id,
                JournalEvent::Persisted {
                    bank_account_id: BankAccountId("bank-account-1".to_string()),
                },
            ),
        ];

        for entry in entries.clone() {
            journal.append(entry).await.unwrap();
        }

        assert_eq!(entries, journal.read_all().await.unwrap());
    }

    #[test]
    fn events_are_tagged() {
        let json = serde_json::to_value(entry(Uuid::nil(), JournalEvent::Started)).unwrap();
        assert_eq!("started", json["event"]["type"]);
    }

    #[test]
    fn persisted_and_compensated_runs_are_reconciled() {
        let persisted = Uuid::new_v4();
        let compensated = Uuid::new_v4();
        let orphaned = Uuid::new_v4();
        let failed_early = Uuid::new_v4();
        let entries = vec![
            entry(persisted, JournalEvent::Started),
            entry(compensated, JournalEvent::Started),
            entry(orphaned, JournalEvent::Started),
            entry(failed_early, JournalEvent::Started),
            entry(persisted, funding_source_created("https://payments/funding/1")),
            entry(compensated, funding_source_created("https://payments/funding/2")),
            entry(orphaned, funding_source_created("https://payments/funding/3")),
            entry(
                failed_early,
                failed(LinkStep::TokenExchange, "upstream_request_failure"),
            ),
            entry(
                persisted,
                JournalEvent::Persisted {
                    bank_account_id: BankAccountId("bank-account-1".to_string()),
                },
            ),
            entry(
                compensated,
                JournalEvent::Compensated {
                    funding_source_url: FundingSourceUrl(
                        "https://payments/funding/2".to_string(),
                    ),
                },
            ),
            entry(orphaned, failed(LinkStep::Persistence, "persistence_failure")),
        ];

        let open = unreconciled(&entries);
        assert_eq!(1, open.len());
        assert_eq!(orphaned, open[0].run_id);
        assert_eq!(
            RunIssue::OrphanedFundingSource {
                account_id: AccountId("acct-1".to_string()),
                funding_source_url: FundingSourceUrl("https://payments/funding/3".to_string()),
            },
            open[0].issue
        );
    }

    #[test]
    fn run_without_outcome_is_incomplete() {
        let crashed = Uuid::new_v4();
        let entries = vec![entry(crashed, JournalEvent::Started)];

        let open = unreconciled(&entries);

        assert_eq!(1, open.len());
        assert_eq!(crashed, open[0].run_id);
        assert_eq!(UserId("user-1".to_string()), open[0].user_id);
        assert_eq!(RunIssue::Incomplete, open[0].issue);
    }

    #[test]
    fn failed_funding_source_request_is_ambiguous() {
        let timed_out = Uuid::new_v4();
        let empty_result = Uuid::new_v4();
        let entries = vec![
            entry(timed_out, JournalEvent::Started),
            entry(empty_result, JournalEvent::Started),
            entry(
                timed_out,
                failed(LinkStep::FundingSource, "upstream_request_failure"),
            ),
            entry(
                empty_result,
                failed(LinkStep::FundingSource, "empty_result_failure"),
            ),
        ];

        let open = unreconciled(&entries);

        assert_eq!(1, open.len());
        assert_eq!(timed_out, open[0].run_id);
        assert_eq!(
            RunIssue::Ambiguous {
                step: LinkStep::FundingSource,
                message: "request failed".to_string(),
            },
            open[0].issue
        );
    }

    #[test]
    fn failed_persistence_without_funding_source_entry_is_ambiguous() {
        let run_id = Uuid::new_v4();
        let entries = vec![
            entry(run_id, JournalEvent::Started),
            entry(run_id, failed(LinkStep::Persistence, "persistence_failure")),
        ];

        let open = unreconciled(&entries);

        assert_eq!(1, open.len());
        assert!(matches!(
            open[0].issue,
            RunIssue::Ambiguous {
                step: LinkStep::Persistence,
                ..
            }
        ));
    }

    #[test]
    fn failures_written_without_step_are_read() {
        let line = r#"{"run_id":"00000000-0000-0000-0000-000000000000","user_id":"user-1","at":"2024-05-01T12:00:00Z","event":{"type":"failed","kind":"encoding_failure","message":"bad"}}"#;
        let entry: JournalEntry = serde_json::from_str(line).unwrap();
        assert_eq!(
            JournalEvent::Failed {
                step: None,
                kind: "encoding_failure".to_string(),
                message: "bad".to_string(),
            },
            entry.event
        );
        assert!(unreconciled(&[entry]).is_empty());
    }
}
