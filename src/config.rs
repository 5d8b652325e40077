//! Runtime configuration. Every value can be given as a command line flag or
//! through the environment. Secrets are only required by the commands that use them.

use anyhow::{anyhow, Context as _, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::Key;
use clap::ValueEnum;
use std::path::PathBuf;

use crate::db::key_from_slice;

#[derive(clap::Args, Debug, Clone)]
pub struct Config {
    /// Where users and bank accounts are stored
    #[arg(long, env = "QUENTIS_STORE", value_enum, default_value_t = StoreKind::Local, global = true)]
    pub store: StoreKind,

    /// Location of the local database file (only used with `--store local`)
    #[arg(long, env = "QUENTIS_DB_PATH", default_value = "quentis.db", global = true)]
    pub db_path: PathBuf,

    /// Location of the link journal
    #[arg(
        long,
        env = "QUENTIS_JOURNAL_PATH",
        default_value = "quentis-link.journal",
        global = true
    )]
    pub journal_path: PathBuf,

    /// Base64 encoded 32 byte key for the local database file
    #[arg(long, env = "QUENTIS_DB_KEY", hide_env_values = true, global = true)]
    pub db_key: Option<String>,

    /// Base64 encoded 32 byte key used to derive sharable account ids. Must never change.
    #[arg(long, env = "QUENTIS_SHARABLE_ID_KEY", hide_env_values = true, global = true)]
    pub sharable_id_key: Option<String>,

    #[arg(long, env = "PLAID_CLIENT_ID", global = true)]
    pub plaid_client_id: Option<String>,

    #[arg(long, env = "PLAID_SECRET", hide_env_values = true, global = true)]
    pub plaid_secret: Option<String>,

    #[arg(long, env = "DWOLLA_KEY", global = true)]
    pub dwolla_key: Option<String>,

    #[arg(long, env = "DWOLLA_SECRET", hide_env_values = true, global = true)]
    pub dwolla_secret: Option<String>,

    #[arg(long, env = "DWOLLA_ENV", value_enum, default_value_t = DwollaEnvironment::Sandbox, global = true)]
    pub dwolla_env: DwollaEnvironment,

    /// e.g. https://cloud.appwrite.io/v1
    #[arg(long, env = "APPWRITE_ENDPOINT", global = true)]
    pub appwrite_endpoint: Option<String>,

    #[arg(long, env = "APPWRITE_PROJECT", global = true)]
    pub appwrite_project: Option<String>,

    #[arg(long, env = "APPWRITE_KEY", hide_env_values = true, global = true)]
    pub appwrite_key: Option<String>,

    #[arg(long, env = "APPWRITE_DATABASE_ID", global = true)]
    pub appwrite_database_id: Option<String>,

    #[arg(long, env = "APPWRITE_USER_COLLECTION_ID", global = true)]
    pub appwrite_user_collection_id: Option<String>,

    #[arg(long, env = "APPWRITE_BANK_COLLECTION_ID", global = true)]
    pub appwrite_bank_collection_id: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Encrypted database file on the local disk
    Local,
    /// Appwrite document database
    Appwrite,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DwollaEnvironment {
    Sandbox,
    Production,
}

#[derive(Debug, Clone)]
pub struct PlaidConfig {
    pub client_id: String,
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct DwollaConfig {
    pub key: String,
    pub secret: String,
    pub environment: DwollaEnvironment,
}

#[derive(Debug, Clone)]
pub struct AppwriteConfig {
    pub endpoint: String,
    pub project: String,
    pub key: String,
    pub database_id: String,
    pub user_collection_id: String,
    pub bank_collection_id: String,
}

impl Config {
    pub fn plaid(&self) -> Result<PlaidConfig> {
        Ok(PlaidConfig {
            client_id: required(&self.plaid_client_id, "PLAID_CLIENT_ID")?,
            secret: required(&self.plaid_secret, "PLAID_SECRET")?,
        })
    }

    pub fn dwolla(&self) -> Result<DwollaConfig> {
        Ok(DwollaConfig {
            key: required(&self.dwolla_key, "DWOLLA_KEY")?,
            secret: required(&self.dwolla_secret, "DWOLLA_SECRET")?,
            environment: self.dwolla_env,
        })
    }

    pub fn appwrite(&self) -> Result<AppwriteConfig> {
        Ok(AppwriteConfig {
            endpoint: required(&self.appwrite_endpoint, "APPWRITE_ENDPOINT")?,
            project: required(&self.appwrite_project, "APPWRITE_PROJECT")?,
            key: required(&self.appwrite_key, "APPWRITE_KEY")?,
            database_id: required(&self.appwrite_database_id, "APPWRITE_DATABASE_ID")?,
            user_collection_id: required(
                &self.appwrite_user_collection_id,
                "APPWRITE_USER_COLLECTION_ID",
            )?,
            bank_collection_id: required(
                &self.appwrite_bank_collection_id,
                "APPWRITE_BANK_COLLECTION_ID",
            )?,
        })
    }

    pub fn db_key(&self) -> Result<Key> {
        parse_key(&required(&self.db_key, "QUENTIS_DB_KEY")?).context("Invalid QUENTIS_DB_KEY")
    }

    pub fn sharable_id_key(&self) -> Result<Key> {
        parse_key(&required(&self.sharable_id_key, "QUENTIS_SHARABLE_ID_KEY")?)
            .context("Invalid QUENTIS_SHARABLE_ID_KEY")
    }
}

fn required(value: &Option<String>, env_name: &str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Missing configuration: set {env_name}"))
}

pub fn parse_key(encoded: &str) -> Result<Key> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("Key is not valid base64")?;
    key_from_slice(&bytes)
}

pub fn encode_key(key: &Key) -> String {
    STANDARD.encode(key.as_slice())
}
