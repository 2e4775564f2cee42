use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::SignedCookieJar;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{AppState, WebError};
use crate::auth::generate_state;
use crate::dates::now_in;
use crate::error::Error;
use crate::session::Session;
use crate::todo::Todo;
use crate::webhook::{verify_signature, WebhookBody, SIGNATURE_HEADER};

type WebResult<T> = std::result::Result<T, WebError>;

const LOGIN_PAGE: &str = include_str!("../../views/login.html");
const LIST_PAGE: &str = include_str!("../../views/list.html");

#[derive(Debug, Deserialize)]
pub(crate) struct AuthQuery {
    #[serde(default)]
    code: String,
    #[serde(default)]
    state: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RemindQuery {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PinRequest {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "Pin")]
    pin: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DoneRequest {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "Done")]
    done: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EditRequest {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "Task")]
    task: String,
    #[serde(rename = "Due")]
    due: DateTime<FixedOffset>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteRequest {
    #[serde(rename = "ID")]
    id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserInfo {
    oauth_name: String,
    oauth_picture: String,
}

/// Compare tokens in constant time. `blake3::Hash` equality does not short-circuit.
pub(crate) fn token_matches(expected: &str, given: Option<&str>) -> bool {
    given.is_some_and(|given| {
        blake3::hash(expected.as_bytes()) == blake3::hash(given.as_bytes())
    })
}

fn session_user(state: &AppState, jar: &SignedCookieJar) -> WebResult<String> {
    Session::load(jar, &state.session)
        .user_id()
        .map(str::to_string)
        .ok_or_else(|| Error::unauthorized("user not found").into())
}

pub(crate) async fn index(State(state): State<AppState>, jar: SignedCookieJar) -> Html<&'static str> {
    if Session::load(&jar, &state.session).is_logged_in() {
        Html(LIST_PAGE)
    } else {
        Html(LOGIN_PAGE)
    }
}

pub(crate) async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> WebResult<(SignedCookieJar, Redirect)> {
    let mut session = Session::load(&jar, &state.session);
    let oauth_state = generate_state();
    let url = state.login.authorize_url(&oauth_state)?;

    session.state = Some(oauth_state);
    let jar = session.store(jar, &state.session)?;
    Ok((jar, Redirect::temporary(url.as_str())))
}

pub(crate) async fn auth(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    query: Result<Query<AuthQuery>, QueryRejection>,
) -> WebResult<Response> {
    let Query(query) = query?;
    let mut session = Session::load(&jar, &state.session);

    let expected = session.state.take();
    if query.state.is_empty() || expected.as_deref() != Some(query.state.as_str()) {
        warn!(
            "Invalid OAuth state, expected {:?}, got {:?}",
            expected, query.state
        );
        return Ok(Redirect::temporary("/").into_response());
    }

    let tokens = state.login.exchange(&query.code).await?;
    let claims = state.verifier.verify(&tokens.id_token)?;
    info!("User {} logged in", claims.sub);

    session.access_token = Some(tokens.access_token);
    session.user_id = Some(claims.sub);
    session.name = Some(claims.name);
    session.picture = Some(claims.picture);
    let jar = session.store(jar, &state.session)?;
    Ok((jar, Redirect::temporary("/")).into_response())
}

pub(crate) async fn list(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> WebResult<Json<Vec<Todo>>> {
    let user_id = session_user(&state, &jar)?;
    let todos = state.storage.with(|s| s.list(&user_id))?;
    Ok(Json(todos))
}

pub(crate) async fn pin(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    payload: Result<Json<PinRequest>, JsonRejection>,
) -> WebResult<StatusCode> {
    let user_id = session_user(&state, &jar)?;
    let Json(request) = payload?;
    state
        .storage
        .with(|s| s.set_pin(&user_id, request.id, request.pin))?;
    Ok(StatusCode::OK)
}

pub(crate) async fn done(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    payload: Result<Json<DoneRequest>, JsonRejection>,
) -> WebResult<StatusCode> {
    let user_id = session_user(&state, &jar)?;
    let Json(request) = payload?;
    state
        .storage
        .with(|s| s.set_done(&user_id, request.id, request.done))?;
    Ok(StatusCode::OK)
}

pub(crate) async fn edit(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    payload: Result<Json<EditRequest>, JsonRejection>,
) -> WebResult<StatusCode> {
    let user_id = session_user(&state, &jar)?;
    let Json(request) = payload?;

    let task = request.task.trim();
    if task.is_empty() {
        return Err(Error::invalid_input("task must not be empty").into());
    }

    state
        .storage
        .with(|s| s.edit(&user_id, request.id, task, request.due))?;
    Ok(StatusCode::OK)
}

pub(crate) async fn delete(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> WebResult<StatusCode> {
    let user_id = session_user(&state, &jar)?;
    let Json(request) = payload?;
    state.storage.with(|s| s.delete(&user_id, request.id))?;
    Ok(StatusCode::OK)
}

pub(crate) async fn user_info(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> WebResult<Json<UserInfo>> {
    let session = Session::load(&jar, &state.session);
    match (session.name, session.picture) {
        (Some(oauth_name), Some(oauth_picture)) => Ok(Json(UserInfo {
            oauth_name,
            oauth_picture,
        })),
        _ => Err(Error::unauthorized("user not found").into()),
    }
}

pub(crate) async fn logout(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> WebResult<(SignedCookieJar, Redirect)> {
    let session = Session::load(&jar, &state.session);
    if let Some(access_token) = session.access_token.as_deref() {
        state.login.revoke(access_token).await?;
    }
    Ok((
        Session::destroy(jar, &state.session),
        Redirect::temporary("/"),
    ))
}

pub(crate) async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebResult<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    verify_signature(&state.channel_secret, &body, signature)?;

    let webhook = WebhookBody::parse(&body).map_err(|e| Error::invalid_input(e.to_string()))?;
    state
        .bot
        .handle_events(&webhook.events, now_in(state.offset))
        .await;
    Ok(StatusCode::OK)
}

pub(crate) async fn remind(
    State(state): State<AppState>,
    query: Result<Query<RemindQuery>, QueryRejection>,
) -> WebResult<StatusCode> {
    let Query(query) = query?;
    if let Some(expected) = &state.reminder_token {
        if !token_matches(expected, query.token.as_deref()) {
            return Err(Error::unauthorized("invalid reminder token").into());
        }
    }

    // Pushes finish in the background.
    let handles = state.bot.remind(now_in(state.offset))?;
    info!("Dispatched {} reminders", handles.len());
    Ok(StatusCode::OK)
}
