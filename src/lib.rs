//! Backend for a personal profile site with an admin-editable
//! achievements list.
//!
//! # General Infrastructure
//! - Public read endpoint serves the achievements map with a 5 minute cache
//! - A single admin account (created once via `/auth/setup`) edits the data
//!   through bearer-token protected routes
//! - Durable state lives in Redis, one JSON value per key; an in-process
//!   cache seeded from `data/achievements.json` keeps reads working when
//!   Redis is unreachable
//!
//! # Auth
//! - Passwords hashed with PBKDF2-HMAC-SHA256, stored as `salt:hash`
//! - Sessions are HMAC-SHA256 signed blobs carrying a role claim, valid for
//!   2 hours
//! - `Authorization: Bearer <token>` on every admin request
//!
//! # Notes
//! - Writes are last-write-wins; a single admin means no reconciliation
//! - Redis outages degrade to the cache for everything except setup, which
//!   must persist the admin record to succeed
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run against a local Redis.
//! ```sh
//! REDIS_URL=redis://127.0.0.1:6379 cargo run
//! ```

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, post},
};
use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod routes;
pub mod state;
pub mod store;

#[cfg(test)]
mod testutil;

use routes::{
    achievements_handler, add_achievement_handler, admin_achievements_handler,
    delete_achievement_handler, get_bio_handler, get_birthday_handler, get_grade_handler,
    login_handler, put_bio_handler, put_birthday_handler, put_grade_handler,
    replace_achievements_handler, require_admin, setup_handler, status_handler,
    update_achievement_handler,
};
use state::State;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let app = build_router(state.clone()).layer(cors);

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

pub fn build_router(state: Arc<State>) -> Router {
    let admin = Router::new()
        .route(
            "/admin/achievements",
            get(admin_achievements_handler)
                .post(add_achievement_handler)
                .put(update_achievement_handler)
                .delete(delete_achievement_handler)
                .patch(replace_achievements_handler),
        )
        .route("/admin/grade", get(get_grade_handler).put(put_grade_handler))
        .route("/admin/bio", get(get_bio_handler).put(put_bio_handler))
        .route(
            "/admin/birthday",
            get(get_birthday_handler).put(put_birthday_handler),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/achievements", get(achievements_handler))
        .route("/auth/setup", post(setup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/status", get(status_handler))
        .merge(admin)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
