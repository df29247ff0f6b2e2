use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use env_logger::Env;

use hotel_reservas::chatbot::IntentExtractor;
use hotel_reservas::config::Config;
use hotel_reservas::db::{self, seed};
use hotel_reservas::handlers;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger and environment
    dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(std::io::Error::other)?;

    log::info!("Connecting to database...");
    let pool = db::get_db_pool(&config.database_url, config.max_connections)
        .await
        .map_err(std::io::Error::other)?;

    log::info!("Running migrations...");
    db::run_migrations(&pool).await.map_err(std::io::Error::other)?;

    seed::init_roles(&pool).await.map_err(std::io::Error::other)?;
    if let Some(admin) = &config.admin {
        seed::bootstrap_admin(&pool, admin)
            .await
            .map_err(std::io::Error::other)?;
    }
    if config.seed_sample_data {
        seed::populate_catalog(&pool).await.map_err(std::io::Error::other)?;
    }

    let bind = (config.host.clone(), config.port);
    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    let extractor = web::Data::new(IntentExtractor::from_config(&config));
    let pool_data = web::Data::new(pool);
    let config_data = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            .app_data(pool_data.clone())
            .app_data(config_data.clone())
            .app_data(extractor.clone())
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(bind)?
    .run()
    .await
}
