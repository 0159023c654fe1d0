//! # imgscribe: image upload, AI description and record keeping
//!
//! `imgscribe` is a small HTTP backend that stores uploaded images in an S3 bucket, asks an
//! OpenAI-compatible vision model to describe them, and keeps the resulting
//! `(imageUrl, description)` records. It also manages user accounts with Argon2id passwords and
//! email-delivered one-time codes for password reset.
//!
//! ## Architecture
//!
//! - **[`pipeline`]**: sequences upload, description and save, remembering each session's most
//!   recent upload
//! - **[`storage`]**: the object store gateway ([`storage::S3ObjectStore`])
//! - **[`describe`]**: the vision model client ([`describe::OpenAiDescriber`])
//! - **[`db`]**: record and user stores, backed by PostgreSQL or memory
//! - **[`api`]**: axum handlers and request/response models
//! - **[`auth`]**: password hashing and OTPs
//!
//! ## Request flow
//!
//! 1. `POST /upload` writes the image to the bucket and returns its public URL
//! 2. `POST /api/generate-description` describes that URL (or an explicit `imageUrl`)
//! 3. `POST /save` keeps a description; `GET /api/images` lists everything saved
//!
//! ## Configuration
//!
//! See [`config`] for the YAML layout and environment overrides.
//!
//! ## Getting started
//!
//! ```no_run
//! use imgscribe::{Application, Config, telemetry};
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = imgscribe::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.ok();
//!     })
//!     .await
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod describe;
pub mod email;
pub mod errors;
mod openapi;
pub mod pipeline;
pub mod storage;
pub mod telemetry;
mod types;

#[cfg(test)]
pub mod test_utils;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderName, HeaderValue},
    routing::{get, post},
};
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
pub use types::{ImageId, RecordId, UserId};

use crate::{
    api::handlers::SESSION_HEADER,
    config::{CorsOrigin, DatabaseConfig, PoolSettings},
    db::{
        memory::MemoryStore,
        postgres::PgStore,
        store::{RecordStore, UserStore},
    },
    describe::OpenAiDescriber,
    email::EmailService,
    openapi::ApiDoc,
    pipeline::Pipeline,
    storage::S3ObjectStore,
};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .pipeline(pipeline)
///     .users(users)
///     .email(email)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub pipeline: Arc<Pipeline>,
    pub users: Arc<dyn UserStore>,
    pub email: Arc<EmailService>,
}

/// Get the imgscribe database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

fn pool_options(settings: &PoolSettings) -> PgPoolOptions {
    let optional = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(optional(settings.idle_timeout_secs))
        .max_lifetime(optional(settings.max_lifetime_secs))
}

/// Connect to the configured store and run migrations. The pool is returned so it can be closed
/// on shutdown.
async fn setup_database(config: &Config) -> anyhow::Result<(Arc<dyn RecordStore>, Arc<dyn UserStore>, Option<PgPool>)> {
    match &config.database {
        DatabaseConfig::External { url, pool } => {
            info!("Using external database");
            let pool = pool_options(pool).connect(url).await?;
            migrator().run(&pool).await?;

            let store = Arc::new(PgStore::new(pool.clone()));
            Ok((store.clone(), store, Some(pool)))
        }
        DatabaseConfig::Memory => {
            info!("Using in-memory store: data will be lost on shutdown");
            let store = Arc::new(MemoryStore::new());
            Ok((store.clone(), store, None))
        }
    }
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allow_origin = if config.cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST])
        .allow_headers([http::header::CONTENT_TYPE, HeaderName::from_static(SESSION_HEADER)])
        .allow_credentials(config.cors.allow_credentials);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router: image and account routes, `/healthz`, `/docs`, plus CORS,
/// body size limit and request tracing.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors_layer = create_cors_layer(&state.config)?;
    let body_limit = state.config.limits.max_upload_bytes;

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        // Images
        .route("/upload", post(api::handlers::images::upload_image))
        .route("/api/generate-description", post(api::handlers::images::generate_description))
        .route("/save", post(api::handlers::images::save_record))
        .route("/api/images", get(api::handlers::images::list_records))
        // Accounts
        .route("/api/register", post(api::handlers::auth::register))
        .route("/login", post(api::handlers::auth::login))
        .route("/forget-password", post(api::handlers::auth::forget_password))
        .route("/reset-password", post(api::handlers::auth::reset_password))
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// A configured server, ready to [`serve`](Application::serve).
pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
}

impl Application {
    /// Connect to every collaborator and build the router
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting imgscribe with configuration: {:#?}", config);

        let (records, users, pool) = setup_database(&config).await?;

        let objects = Arc::new(S3ObjectStore::new(&config.storage).await);
        let describer = Arc::new(OpenAiDescriber::new(&config.describer)?);
        let pipeline = Arc::new(Pipeline::new(
            objects,
            describer,
            records,
            config.describer.clone(),
            &config.uploads,
        ));
        let email = Arc::new(EmailService::new(&config.email)?);

        let state = AppState::builder()
            .config(config.clone())
            .pipeline(pipeline)
            .users(users)
            .email(email)
            .build();

        let router = build_router(state)?;

        Ok(Self { router, config, pool })
    }

    /// Serve until `shutdown` resolves, then close the database pool and flush telemetry
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("imgscribe listening on http://{}", bind_addr);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
