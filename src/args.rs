use clap::{Parser, Subcommand};
use std::net::IpAddr;

use crate::config::Config;

/// Link bank accounts through Plaid and register them as Dwolla funding sources.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    #[command(flatten)]
    pub config: Config,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new local database file
    Init,

    /// Print a fresh random key for QUENTIS_DB_KEY or QUENTIS_SHARABLE_ID_KEY
    GenerateKey,

    /// Add a user whose Dwolla customer already exists
    AddUser {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// e.g. https://api-sandbox.dwolla.com/customers/<id>
        #[arg(long)]
        dwolla_customer_url: Option<String>,
    },

    /// List all users in the store
    ListUsers,

    /// Link a bank account for a user
    LinkAccount {
        /// Id of the user in the store
        user_id: String,

        /// Exchange this public token instead of running the in-browser link flow
        #[arg(long)]
        public_token: Option<String>,
    },

    /// List the bank accounts linked for a user
    ListAccounts { user_id: String },

    /// Print current balances of all bank accounts of a user
    Summary { user_id: String },

    /// Find the bank account behind a sharable id
    Lookup { sharable_id: String },

    /// List link runs that created a funding source but neither stored nor removed it
    Journal,

    /// Run the JSON API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        address: IpAddr,
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

pub fn parse() -> Args {
    Args::parse()
}
