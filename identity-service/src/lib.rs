pub mod config;
pub mod dtos;
pub mod guard;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod store;
pub mod utils;

use axum::{
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::IdentityConfig;
use crate::handlers::{accounts, auth, groups, health, stats};
use crate::middleware::{metrics_middleware, session_middleware};
use crate::services::{
    CredentialStore, GroupRegistry, MembershipGraph, SessionAuthenticator, SessionPolicy,
    SessionRegistry,
};
use crate::store::IdentityStore;
use crate::utils::CredentialHasher;

#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub store: Arc<dyn IdentityStore>,
    pub credentials: CredentialStore,
    pub groups: GroupRegistry,
    pub membership: MembershipGraph,
    pub authenticator: SessionAuthenticator,
}

impl AppState {
    /// Wire the five components over one store.
    pub fn new(config: IdentityConfig, store: Arc<dyn IdentityStore>) -> Result<Self, AppError> {
        let hasher = CredentialHasher::with_cost(
            config.hashing.memory_kib,
            config.hashing.iterations,
            config.hashing.parallelism,
        )
        .map_err(AppError::ConfigError)?;

        let membership = MembershipGraph::new(store.clone());
        let credentials = CredentialStore::new(store.clone(), hasher, membership.clone());
        let groups = GroupRegistry::new(store.clone(), membership.clone());
        let sessions = SessionRegistry::new(config.session.ttl()?);
        let authenticator = SessionAuthenticator::new(
            credentials.clone(),
            sessions,
            SessionPolicy {
                revoke_on_password_change: config.session.revoke_on_password_change,
            },
        );

        Ok(Self {
            config,
            store,
            credentials,
            groups,
            membership,
            authenticator,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let account_routes = Router::new()
        .route(
            "/api/users",
            get(accounts::list_accounts).post(accounts::create_account),
        )
        .route(
            "/api/users/:id",
            get(accounts::get_account)
                .put(accounts::update_account)
                .delete(accounts::delete_account),
        )
        .route("/api/users/:id/activate", post(accounts::activate_account))
        .route(
            "/api/users/:id/deactivate",
            post(accounts::deactivate_account),
        )
        .route("/api/users/:id/toggle-active", post(accounts::toggle_active))
        .route("/api/users/:id/make-admin", post(accounts::make_admin))
        .route("/api/users/:id/remove-admin", post(accounts::remove_admin))
        .route("/api/users/:id/toggle-admin", post(accounts::toggle_admin))
        .route(
            "/api/users/:id/reset-password",
            post(accounts::reset_password),
        )
        .route(
            "/api/users/:id/groups",
            get(accounts::account_groups)
                .post(accounts::add_account_groups)
                .put(accounts::replace_account_groups),
        )
        .route(
            "/api/users/:id/groups/:group_id",
            axum::routing::delete(accounts::remove_account_group),
        );

    let group_routes = Router::new()
        .route(
            "/api/groups",
            get(groups::list_groups).post(groups::create_group),
        )
        .route(
            "/api/groups/:id",
            get(groups::get_group)
                .put(groups::update_group)
                .delete(groups::delete_group),
        )
        .route("/api/groups/:id/users", get(groups::group_members))
        .route(
            "/api/groups/:id/users/:user_id",
            post(groups::add_member).delete(groups::remove_member),
        );

    let cors = cors_layer(&state.config.security.allowed_origins);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/api/stats", get(stats::stats))
        .merge(account_routes)
        .merge(group_routes)
        .layer(from_fn_with_state(state.clone(), session_middleware))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

/// A `*` entry allows any origin, in which case credentials are not allowed.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ]);

    if allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(origin) => Some(origin),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect::<Vec<HeaderValue>>();

    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}
