//! JSON API for the dashboard frontend.

use anyhow::Result;
use rocket::{
    get,
    http::Status,
    post,
    response::content::RawJson,
    routes,
    serde::json::Json,
    Build, Config, Rocket, State,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

use crate::cache::InMemoryViewCache;
use crate::db::{DocumentStore, SharableId, SharedBankAccount, User, UserId};
use crate::error::LinkError;
use crate::link::{LinkWorkflow, LinkingProvider, PublicToken};
use crate::sharable_id::SharableIdCodec;
use crate::summary;

pub struct AppState {
    pub workflow: LinkWorkflow,
    pub linking: Arc<dyn LinkingProvider>,
    pub store: Arc<dyn DocumentStore>,
    pub cache: Arc<InMemoryViewCache>,
    pub codec: SharableIdCodec,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

type ApiError = (Status, Json<ErrorBody>);
type ApiResult<T> = std::result::Result<T, ApiError>;

fn api_error(status: Status, error: &str, message: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
            message: message.to_string(),
        }),
    )
}

fn link_error(error: LinkError) -> ApiError {
    let status = match &error {
        LinkError::MissingCustomerId(_) => Status::UnprocessableEntity,
        LinkError::DuplicateAccount { .. } => Status::Conflict,
        LinkError::Encoding(_) => Status::BadRequest,
        LinkError::UpstreamRequest { .. } | LinkError::EmptyResult { .. } => Status::BadGateway,
        LinkError::Persistence { .. }
        | LinkError::Lookup(_)
        | LinkError::Journal(_)
        | LinkError::InvalidTransition { .. } => Status::InternalServerError,
    };
    api_error(status, error.kind(), error)
}

async fn load_user(state: &AppState, id: &str) -> ApiResult<User> {
    state
        .store
        .get_user(&UserId(id.to_string()))
        .await
        .map_err(|err| api_error(Status::InternalServerError, "lookup_failure", err))?
        .ok_or_else(|| api_error(Status::NotFound, "not_found", format!("User {id} not found")))
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LinkTokenResponse {
    pub link_token: String,
}

#[get("/users/<id>/link-token")]
async fn link_token(id: &str, state: &State<AppState>) -> ApiResult<Json<LinkTokenResponse>> {
    let user = load_user(state, id).await?;
    let link_token = state
        .linking
        .create_link_token(&user)
        .await
        .map_err(|err| api_error(Status::BadGateway, "upstream_request_failure", err))?;
    Ok(Json(LinkTokenResponse {
        link_token: link_token.0,
    }))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    pub public_token: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResponse {
    pub public_token_exchange: String,
    pub run_id: String,
    pub bank_account: SharedBankAccountBody,
}

/// [SharedBankAccount] as it goes over the wire
pub type SharedBankAccountBody = serde_json::Value;

#[post("/users/<id>/exchange-public-token", data = "<request>")]
async fn exchange_public_token(
    id: &str,
    request: Json<ExchangeRequest>,
    state: &State<AppState>,
) -> ApiResult<Json<ExchangeResponse>> {
    let user = load_user(state, id).await?;
    let outcome = state
        .workflow
        .exchange_public_token(&PublicToken(request.into_inner().public_token), &user)
        .await
        .map_err(link_error)?;
    Ok(Json(ExchangeResponse {
        public_token_exchange: "complete".to_string(),
        run_id: outcome.run_id.to_string(),
        bank_account: shared_body(&outcome.bank_account.to_shared())?,
    }))
}

fn shared_body(account: &SharedBankAccount) -> ApiResult<SharedBankAccountBody> {
    serde_json::to_value(account)
        .map_err(|err| api_error(Status::InternalServerError, "encoding_failure", err))
}

#[get("/users/<id>/summary")]
async fn accounts_summary(id: &str, state: &State<AppState>) -> ApiResult<RawJson<String>> {
    let user = load_user(state, id).await?;
    let path = format!("/users/{}/summary", user.id);
    let view = state
        .cache
        .get_or_render(&path, || async {
            let summary =
                summary::summarize(state.linking.as_ref(), state.store.as_ref(), &user.id).await?;
            Ok::<_, anyhow::Error>(serde_json::to_string(&summary)?)
        })
        .await
        .map_err(|err| api_error(Status::BadGateway, "summary_failure", format!("{err:#}")))?;
    Ok(RawJson(view))
}

#[get("/shared/<sharable_id>")]
async fn shared_account(
    sharable_id: &str,
    state: &State<AppState>,
) -> ApiResult<Json<SharedBankAccountBody>> {
    let account_id = state
        .codec
        .decode(&SharableId(sharable_id.to_string()))
        .map_err(|_| api_error(Status::NotFound, "not_found", "Unknown sharable id"))?;
    let account = state
        .store
        .find_bank_account_by_account_id(&account_id)
        .await
        .map_err(|err| api_error(Status::InternalServerError, "lookup_failure", err))?
        .ok_or_else(|| api_error(Status::NotFound, "not_found", "Unknown sharable id"))?;
    Ok(Json(shared_body(&account.to_shared())?))
}

pub fn rocket(state: AppState) -> Rocket<Build> {
    rocket::build().manage(state).mount(
        "/",
        routes![
            link_token,
            exchange_public_token,
            accounts_summary,
            shared_account
        ],
    )
}

/// Serve the API until the process is shut down
pub async fn serve(state: AppState, address: IpAddr, port: u16) -> Result<()> {
    log::info!("Listening on {address}:{port}");
    rocket(state)
        .configure(Config {
            address,
            port,
            ..Config::default()
        })
        .launch()
        .await?;
    Ok(())
}
