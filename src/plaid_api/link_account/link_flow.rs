use anyhow::Result;
use plaid::{model::LinkTokenCreateRequestUser, request::LinkTokenCreateRequired};

use crate::db::{AccessToken, ItemId};
use crate::link::{ExchangedToken, LinkToken, PublicToken};
use crate::plaid_api::Plaid;

const LANGUAGE: &str = "en";
const PRODUCTS: &[&str] = &["auth"];
const COUNTRY_CODES: &[&str] = &[
    "AL", "AD", "AM", "AT", "BY", "BE", "BA", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR",
    "GE", "DE", "GR", "HU", "IS", "IE", "IT", "LV", "LI", "LT", "LU", "MT", "MD", "MC", "ME",
    "NL", "MK", "NO", "PL", "PT", "RO", "RU", "SM", "RS", "SK", "SI", "ES", "SE", "CH", "TR",
    "UA", "VA", "US", "GB", "CA", "AU", "NZ", "ZA",
];

const CONNECTION_TEST_CLIENT_NAME: &str = "quentis-link";
const CONNECTION_TEST_USER_ID: &str = "connection-test";

/// Create the token that opens a Plaid Link session. `client_name` is shown to the user in the Link dialog.
pub(in crate::plaid_api) async fn link_token_create(
    client: &Plaid,
    client_name: &str,
    client_user_id: &str,
) -> Result<LinkToken> {
    log::info!("Creating link token...");
    let response = client
        .client()
        .link_token_create(LinkTokenCreateRequired {
            client_name,
            country_codes: COUNTRY_CODES,
            language: LANGUAGE,
            user: LinkTokenCreateRequestUser {
                client_user_id: client_user_id.to_string(),
                ..Default::default()
            },
        })
        .products(PRODUCTS)
        .await?;
    log::info!("Creating link token...done");
    Ok(LinkToken(response.link_token))
}

pub(in crate::plaid_api) async fn exchange_public_token(
    client: &Plaid,
    public_token: &PublicToken,
) -> Result<ExchangedToken> {
    log::info!("Exchanging public token...");
    let response = client
        .client()
        .item_public_token_exchange(&public_token.0)
        .await?;
    log::info!("Exchanging public token...done");
    Ok(ExchangedToken {
        access_token: AccessToken::new(response.access_token),
        item_id: ItemId(response.item_id),
    })
}

/// Check the credentials by creating a throwaway link token
pub async fn test_connection(client: &Plaid) -> Result<()> {
    link_token_create(client, CONNECTION_TEST_CLIENT_NAME, CONNECTION_TEST_USER_ID).await?;
    Ok(())
}
