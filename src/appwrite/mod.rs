//! Appwrite document database over its REST API.

mod client;
mod documents;

pub use client::Appwrite;
