use std::net::{IpAddr, Ipv4Addr};

use anyhow::{anyhow, Result};
use console::style;
use rocket::{get, response::content::RawHtml, routes, Config, Shutdown, State};
use std::sync::Mutex;

use crate::link::{LinkToken, PublicToken};

const LISTEN_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
const LISTEN_PORT: u16 = 8080;

struct ServerState {
    link_token: LinkToken,
    public_token: Mutex<Option<PublicToken>>,
}

/// Run the Plaid Link flow in the browser and return the public token it produced.
/// This starts a local web server and blocks until the user finished linking.
pub async fn link_in_browser(link_token: LinkToken) -> Result<PublicToken> {
    let server = rocket::custom(Config {
        log_level: rocket::config::LogLevel::Critical,
        address: LISTEN_ADDR,
        port: LISTEN_PORT,
        ..Default::default()
    })
    .manage(ServerState {
        link_token,
        public_token: Mutex::new(None),
    })
    .mount("/", routes![show_auth_page, submit_token_api])
    .ignite()
    .await?;

    let url = format!("http://{LISTEN_ADDR}:{LISTEN_PORT}");

    println!("Starting in-browser link flow.");
    println!("If it doesn't open automatically, please open the following URL in your browser:");
    println!("{}", style(&url).cyan().italic());
    if let Err(err) = open::that(&url) {
        log::warn!("Failed to open browser: {err}");
    }

    // start server and wait for it to shutdown
    let server = server.launch().await?;
    let public_token = server
        .state::<ServerState>()
        .ok_or_else(|| anyhow!("Link server lost its state"))?
        .public_token
        .lock()
        .map_err(|_| anyhow!("Link server state is poisoned"))?
        .take()
        .ok_or_else(|| anyhow!("Did not complete link flow"))?;
    Ok(public_token)
}

#[get("/")]
fn show_auth_page(state: &State<ServerState>) -> RawHtml<String> {
    let link_token = &state.link_token.0;
    RawHtml(format!(
        r#"
        <html>
            <body>
                <script src="https://cdn.plaid.com/link/v2/stable/link-initialize.js"></script>
                <script>
                    var linkHandler = Plaid.create({{
                        token: '{link_token}',
                        onLoad: function() {{
                            linkHandler.open();
                        }},
                        onSuccess: function(public_token, metadata) {{
                            window.location.replace("/submit_token/" + encodeURIComponent(public_token));
                        }},
                        onExit: function(err, metadata) {{
                            if (err != null) {{
                                document.body.innerText = "Linking failed: " + err.display_message;
                            }}
                        }}
                    }});
                </script>
            </body>
        </html>
    "#
    ))
}

#[get("/submit_token/<token>")]
fn submit_token_api(
    token: &str,
    state: &State<ServerState>,
    shutdown: Shutdown,
) -> RawHtml<&'static str> {
    match state.public_token.lock() {
        Ok(mut public_token) => *public_token = Some(PublicToken(token.to_string())),
        Err(_) => log::error!("Link server state is poisoned"),
    }
    shutdown.notify();
    RawHtml(
        r#"
        <html>
            <body>
                <h1>Success</h1>
                <p>You can close this page now</p>
            </body>
        </html>
    "#,
    )
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client};

    use super::*;

    fn server() -> rocket::Rocket<rocket::Build> {
        rocket::build()
            .manage(ServerState {
                link_token: LinkToken("link-sandbox-123".to_string()),
                public_token: Mutex::new(None),
            })
            .mount("/", routes![show_auth_page, submit_token_api])
    }

    #[tokio::test]
    async fn auth_page_embeds_link_token() {
        let client = Client::tracked(server()).await.unwrap();
        let response = client.get("/").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert!(response
            .into_string()
            .await
            .unwrap()
            .contains("token: 'link-sandbox-123'"));
    }

    #[tokio::test]
    async fn submitted_token_is_stored() {
        let client = Client::tracked(server()).await.unwrap();
        let response = client
            .get("/submit_token/public-sandbox-abc")
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let state = client.rocket().state::<ServerState>().unwrap();
        assert_eq!(
            Some(PublicToken("public-sandbox-abc".to_string())),
            state.public_token.lock().unwrap().clone()
        );
    }
}
