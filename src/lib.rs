pub mod appwrite;
pub mod args;
pub mod cache;
pub mod cli;
pub mod config;
pub mod db;
pub mod dwolla_api;
pub mod error;
pub mod journal;
pub mod link;
pub mod plaid_api;
pub mod server;
pub mod sharable_id;
pub mod summary;
pub mod terminal;

#[cfg(test)]
mod test_utils;
