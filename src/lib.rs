pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod openapi;
pub mod schema;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::archival::ArchivalSideChannel;
use application::order_service::OrderService;
use config::{AppConfig, ConfigError};
use domain::errors::DomainError;
use domain::ports::{IdentityVerifier, OrderRepository};
use infrastructure::archive_client::HttpOrderArchiver;
use infrastructure::identity::IdentityToolkitVerifier;
use infrastructure::order_repo::DieselOrderRepository;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), DomainError> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| DomainError::Internal(format!("migrations failed: {e}")))?;
    Ok(())
}

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub identity: Arc<dyn IdentityVerifier>,
    /// Absent when no archive endpoint is configured.
    pub archival: Option<Arc<ArchivalSideChannel>>,
}

impl AppState {
    pub fn from_config(config: &AppConfig, pool: DbPool) -> Result<Self, ConfigError> {
        let repo: Arc<dyn OrderRepository> = Arc::new(DieselOrderRepository::new(
            pool,
            config.order_tx_max_attempts,
            config.order_tx_timeout,
        ));
        let identity = Arc::new(IdentityToolkitVerifier::new(&config.identity)?);
        let archival = match &config.archive {
            Some(archive) => Some(Arc::new(ArchivalSideChannel::new(
                Arc::new(HttpOrderArchiver::new(archive)?),
                Arc::clone(&repo),
            ))),
            None => None,
        };
        Ok(Self {
            orders: OrderService::new(repo),
            identity,
            archival,
        })
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("", web::get().to(handlers::orders::list_orders))
            .route("/place", web::post().to(handlers::orders::place_order))
            .route("/{id}", web::get().to(handlers::orders::get_order)),
    );
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    state: AppState,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .configure(configure_routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
