use std::sync::Arc;

use cod_orders::application::archival::spawn_sweeper;
use cod_orders::config::AppConfig;
use cod_orders::{build_server, create_pool, run_migrations, AppState};
use dotenvy::dotenv;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;

    let pool = create_pool(&config.database_url).map_err(std::io::Error::other)?;
    run_migrations(&pool).map_err(std::io::Error::other)?;

    let state = AppState::from_config(&config, pool).map_err(std::io::Error::other)?;
    if let Some(archival) = &state.archival {
        spawn_sweeper(Arc::clone(archival), config.sweep.clone());
    }

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(state, &config.host, config.port)?.await
}
