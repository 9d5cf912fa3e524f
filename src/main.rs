// src/main.rs
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use governor::RateLimiter;
use log::info;
use server_browser::config::Config;
use server_browser::extension::Extensions;
use server_browser::handlers::{self, HeartbeatLimiter, ServerListLimiter};
use server_browser::storage::memory::{run_sweeper, ServerStorage};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env();
    let bind = config.bind();

    let heartbeat_rate_limiter =
        web::Data::new(HeartbeatLimiter(RateLimiter::keyed(config.heartbeat_quota())));
    let server_list_rate_limiter =
        web::Data::new(ServerListLimiter(RateLimiter::keyed(config.server_list_quota())));
    let extensions = web::Data::new(Extensions::standard());
    let sweep_interval = config.sweep_interval();
    let storage = web::Data::new(ServerStorage::new(config));

    tokio::spawn(run_sweeper(storage.clone().into_inner(), sweep_interval));

    info!("Starting server on {}", bind);
    HttpServer::new(move || {
        App::new()
            .app_data(storage.clone())
            .app_data(extensions.clone())
            .app_data(heartbeat_rate_limiter.clone())
            .app_data(server_list_rate_limiter.clone())
            .configure(handlers::routes)
    })
        .bind(&bind)?
        .run().await
}
