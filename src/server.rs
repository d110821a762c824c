//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Access | Description |
//! |--------|------|--------|-------------|
//! | `GET`  | `/` | public | Landing page |
//! | `GET`  | `/sign-in`, `/sign-up` | public | Hand-off to the identity provider |
//! | `GET`  | `/sign-out` | any | Clears the session cookie |
//! | `GET`  | `/dashboard` | protected | Outlier dashboard (`?q=`, `?sort=`) |
//! | `GET`  | `/subscribe` | protected | Subscription checkout |
//! | `POST` | `/api/create-payment-link` | any | Personalised checkout URL |
//! | `POST` | `/api/checkout` | any | Fixed-price checkout URL |
//! | `GET`  | `/health` | any | Health check (returns version) |
//! | `GET`  | `/static/*` | excluded | Files from `[server].static_dir` |
//!
//! Access is decided by the [`guard`](crate::guard) middleware, which wraps
//! every route; the table above reflects the default route configuration.

use anyhow::Result;
use axum::{
    extract::{Query, Request, State},
    http::header::SET_COOKIE,
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::auth::{IdentityProvider, SignedCookieProvider};
use crate::billing::{BillingProvider, PaddleBilling};
use crate::catalog::LinkTemplates;
use crate::checkout::{handle_checkout, handle_create_payment_link};
use crate::config::Config;
use crate::dashboard::DashboardView;
use crate::guard::{guard_layer, Guard, RouteTable};
use crate::models::{Session, SortKey};
use crate::outliers::{HttpOutlierSource, OutlierSource};
use crate::pages::{self, DashboardPage, SubscribePage};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub outliers: Arc<dyn OutlierSource>,
    pub billing: Arc<dyn BillingProvider>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Wires the production collaborators from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let identity = SignedCookieProvider::new(
            config.session_secret()?,
            &config.auth.cookie_name,
            config.auth.session_ttl_secs,
        );
        let billing = PaddleBilling::new(
            &config.billing,
            Duration::from_secs(config.data.timeout_secs),
        )?;
        Ok(Self {
            config: Arc::new(config.clone()),
            outliers: Arc::new(HttpOutlierSource::new(&config.data)?),
            billing: Arc::new(billing),
            identity: Arc::new(identity),
        })
    }
}

/// Builds the router with the guard and CORS layers applied.
pub fn build_router(state: AppState) -> Result<Router> {
    let cfg = state.config.clone();
    let table = RouteTable::from_config(&cfg.routes)?;
    let guard = Arc::new(Guard::new(
        table,
        state.identity.clone(),
        &cfg.auth.sign_in_path,
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/", get(handle_landing))
        .route(&cfg.auth.sign_in_path, get(handle_sign_in))
        .route(&cfg.auth.sign_up_path, get(handle_sign_up))
        .route("/sign-out", get(handle_sign_out))
        .route("/dashboard", get(handle_dashboard))
        .route("/subscribe", get(handle_subscribe))
        .route("/api/create-payment-link", post(handle_create_payment_link))
        .route("/api/checkout", post(handle_checkout))
        .route("/health", get(handle_health))
        .nest_service("/static", ServeDir::new(&cfg.server.static_dir))
        .layer(middleware::from_fn_with_state(guard, guard_layer))
        .layer(cors)
        .with_state(state);

    Ok(router)
}

/// Starts the server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config) -> Result<()> {
    config.validate_for_serve()?;
    let state = AppState::from_config(config)?;
    let app = build_router(state)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        outliers = %config.data.outliers_url,
        static_dir = %config.server.static_dir.display(),
        "NicheFire listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Pages ============

/// The landing page reads the session only to pick its call to action; access
/// is never refused here.
async fn handle_landing(State(state): State<AppState>, request: Request) -> Html<String> {
    let session = match state.identity.session(request.headers()).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "identity lookup failed on landing page");
            None
        }
    };
    Html(pages::render_landing(
        session.as_ref().map(|s| &s.profile),
        &state.config.auth.sign_up_path,
    ))
}

async fn handle_sign_in(State(state): State<AppState>) -> Html<String> {
    Html(pages::render_auth_handoff(
        "Sign In",
        state.config.auth.hosted_sign_in_url.as_deref(),
    ))
}

async fn handle_sign_up(State(state): State<AppState>) -> Html<String> {
    Html(pages::render_auth_handoff(
        "Sign Up",
        state.config.auth.hosted_sign_up_url.as_deref(),
    ))
}

async fn handle_sign_out(State(state): State<AppState>) -> Response {
    let cookie = format!(
        "{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax",
        state.config.auth.cookie_name
    );
    ([(SET_COOKIE, cookie)], Redirect::to("/")).into_response()
}

#[derive(Debug, Deserialize)]
struct DashboardQuery {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    sort: Option<String>,
}

async fn handle_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
    request: Request,
) -> Html<String> {
    let cfg = &state.config.dashboard;
    let sort = query
        .sort
        .as_deref()
        .and_then(|s| s.parse::<SortKey>().ok())
        .unwrap_or(cfg.default_sort);

    let mut view = DashboardView::new(LinkTemplates::from(cfg), sort);
    view.load(state.outliers.as_ref()).await;
    if let Some(q) = &query.q {
        view.set_filter(q);
    }

    let session = request.extensions().get::<Session>();
    Html(pages::render_dashboard(&DashboardPage {
        view: &view,
        profile: session.map(|s| &s.profile),
        debounce_ms: cfg.debounce_ms,
    }))
}

async fn handle_subscribe(State(state): State<AppState>, request: Request) -> Response {
    let Some(session) = request.extensions().get::<Session>() else {
        return Redirect::to(&state.config.auth.sign_in_path).into_response();
    };
    let billing = &state.config.billing;
    Html(pages::render_subscribe(&SubscribePage {
        profile: &session.profile,
        script_url: &billing.script_url,
        client_token: billing.client_token.as_deref(),
        environment: &billing.environment,
    }))
    .into_response()
}
