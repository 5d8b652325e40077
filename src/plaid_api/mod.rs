mod accounts;
mod client;
mod link_account;
mod processor_token;

pub use client::Plaid;
pub use link_account::{link_in_browser, test_connection};
