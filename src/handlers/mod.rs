use governor::{RateLimiter, clock::DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use std::net::IpAddr;

pub mod heartbeat;
pub mod index;
pub mod servers;

pub type IpRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Limits snapshot submissions per client IP.
pub struct HeartbeatLimiter(pub IpRateLimiter);

/// Limits list and mutation requests per client IP.
pub struct ServerListLimiter(pub IpRateLimiter);

pub fn routes(cfg: &mut actix_web::web::ServiceConfig) {
    use actix_web::web;

    cfg.route("/", web::get().to(index::index))
        .route("/server/heartbeat", web::post().to(heartbeat::handle_heartbeat))
        .route("/server/", web::get().to(servers::get_servers))
        .route("/server/changed", web::get().to(servers::get_changed))
        .route("/server/delete", web::post().to(servers::delete_server))
        .route("/server/failure", web::post().to(servers::report_failure))
        .route("/server/buddies", web::post().to(servers::set_buddies))
        .route("/server/geo", web::post().to(servers::set_geo));
}
