//! Dwolla payments API, used to attach linked bank accounts to a customer as funding sources.

mod client;
mod funding_source;

pub use client::Dwolla;
