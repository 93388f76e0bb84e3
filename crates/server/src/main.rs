use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, on, MethodFilter, MethodRouter},
    Form, Json, Router,
};
use personnel_api::{
    handle_commute_list, handle_login_form, handle_logout, handle_main, ApiContext, HttpMethod,
    LoginFormQuery, RequestContext, RouteHandler, LOGIN_ROUTE, ROUTE_TABLE,
};
use serde::Deserialize;
use shared::error::{ApiError, ErrorCode};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod auth;
mod config;
mod render;

use app_state::{AppState, AuthSettings};
use auth::{authenticate, LoginError, SessionStore};
use config::{load_settings, normalize_database_url, Settings};
use render::render;

const MAX_FORM_BYTES: usize = 16 * 1024;
const SESSION_SWEEP_FALLBACK: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    bootstrap_admin(&storage, &settings).await?;

    let sessions = SessionStore::new(settings.session_ttl_minutes);
    let sweeper = tokio::spawn(sweep_sessions(sessions.clone()));
    let state = AppState {
        api: ApiContext::new(storage.clone()),
        sessions,
        auth: AuthSettings::from(&settings),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "personnel server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    storage.close().await;
    info!("personnel server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for shutdown signal");
    }
}

/// Drops idle sessions that nobody looks up again.
async fn sweep_sessions(sessions: SessionStore) {
    let period = sessions
        .idle_timeout()
        .to_std()
        .unwrap_or(SESSION_SWEEP_FALLBACK)
        .min(SESSION_SWEEP_FALLBACK);
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        sessions.purge_expired().await;
    }
}

async fn bootstrap_admin(storage: &Storage, settings: &Settings) -> anyhow::Result<()> {
    let Some(username) = settings.admin_username.as_deref() else {
        return Ok(());
    };
    let Some(password) = settings.admin_password.as_deref() else {
        warn!(%username, "admin username configured without a password; skipping bootstrap");
        return Ok(());
    };
    if storage.user_exists(username).await? {
        return Ok(());
    }
    storage.create_user(username, password).await?;
    info!(%username, "created bootstrap admin account");
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new().route("/healthz", get(healthz));
    for entry in ROUTE_TABLE {
        let Some(filter) = method_filter(entry.methods) else {
            continue;
        };
        router = router.route(entry.path, dispatcher_route(entry.handler, filter));
    }
    router
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(MAX_FORM_BYTES))
        .with_state(state)
}

fn method_filter(methods: &[HttpMethod]) -> Option<MethodFilter> {
    methods
        .iter()
        .map(|method| match method {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
        })
        .reduce(MethodFilter::or)
}

fn dispatcher_route(handler: RouteHandler, filter: MethodFilter) -> MethodRouter<Arc<AppState>> {
    match handler {
        RouteHandler::Main => on(filter, personnel_main),
        RouteHandler::CommuteList => on(filter, commute_list),
        RouteHandler::LoginForm => on(filter, login_form).post(login_submit),
        RouteHandler::Logout => on(filter, logout),
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    match state.api.storage.health_check().await {
        Ok(()) => "ok".into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Unavailable, e.to_string())),
        )
            .into_response(),
    }
}

async fn not_found() -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new(ErrorCode::NotFound, "route not found")),
    )
}

async fn context_for(state: &AppState, headers: &HeaderMap) -> RequestContext {
    auth::request_context(&state.sessions, &state.auth.session_cookie, headers).await
}

async fn personnel_main(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let ctx = context_for(&state, &headers).await;
    if !ctx.is_authenticated() {
        return Redirect::to(LOGIN_ROUTE).into_response();
    }
    render(handle_main(&ctx, state.api.employee_list.as_ref()).await)
}

async fn commute_list(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let ctx = context_for(&state, &headers).await;
    if !ctx.is_authenticated() {
        return Redirect::to(LOGIN_ROUTE).into_response();
    }
    render(handle_commute_list())
}

async fn login_form(Query(params): Query<Vec<(String, String)>>) -> Response {
    let query = LoginFormQuery::from_pairs(params);
    render(handle_login_form(&query))
}

async fn login_submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let username = match authenticate(&state.api.storage, &form.username, &form.password).await {
        Ok(username) => username,
        Err(LoginError::InvalidCredentials) => {
            return Redirect::to(&format!("{LOGIN_ROUTE}?error")).into_response();
        }
        Err(e @ LoginError::Storage(_)) => {
            error!(error = %e, "login failed");
            return internal_error(e.to_string());
        }
    };

    // Never carry a pre-login session id across authentication.
    if let Some(previous) = auth::parse_cookie(&headers, &state.auth.session_cookie) {
        state.sessions.invalidate(&previous).await;
    }
    let session_id = state.sessions.create(username.clone()).await;
    let cookie = match auth::session_cookie(&state.auth.session_cookie, &session_id) {
        Ok(cookie) => cookie,
        Err(e) => {
            state.sessions.invalidate(&session_id).await;
            return internal_error(format!("invalid session cookie: {e}"));
        }
    };
    let active_sessions = state.sessions.len().await;
    info!(%username, active_sessions, "session created");

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::SET_COOKIE, cookie);
    (
        response_headers,
        Redirect::to(&state.auth.login_success_url),
    )
        .into_response()
}

async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(session_id) = auth::parse_cookie(&headers, &state.auth.session_cookie) {
        if state.sessions.invalidate(&session_id).await {
            info!("session invalidated");
        }
    }

    let mut response_headers = HeaderMap::new();
    match auth::clear_session_cookie(&state.auth.session_cookie) {
        Ok(cookie) => {
            response_headers.insert(header::SET_COOKIE, cookie);
        }
        Err(e) => warn!(error = %e, "could not build session clearing cookie"),
    }
    (
        response_headers,
        render(handle_logout(&state.auth.logout_redirect)),
    )
        .into_response()
}

fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::new(ErrorCode::Internal, message)),
    )
        .into_response()
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
