mod link_flow;
mod link_http_server;

pub use link_flow::test_connection;
pub(super) use link_flow::{exchange_public_token, link_token_create};
pub use link_http_server::link_in_browser;
