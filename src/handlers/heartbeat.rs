// src/handlers/heartbeat.rs
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, error, info};
use serde::Deserialize;
use crate::extension::Extensions;
use crate::handlers::HeartbeatLimiter;
use crate::models::server::{Player, Rule, ServerInfo};
use crate::storage::memory::ServerStorage;
use crate::utils::{extract_real_ip, parse_address, unix_millis, RequestError};

/// A query result delivered by a query worker. Absent parts leave the
/// record's previous values in place.
#[derive(Debug, Deserialize)]
pub struct SnapshotReport {
    pub address: String,
    #[serde(default)]
    pub info: Option<ServerInfo>,
    #[serde(default)]
    pub players: Option<Vec<Player>>,
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
}

pub async fn handle_heartbeat(
    req: HttpRequest,
    storage: web::Data<ServerStorage>,
    extensions: web::Data<Extensions>,
    rate_limiter: web::Data<HeartbeatLimiter>,
    report: web::Json<SnapshotReport>,
) -> Result<HttpResponse, RequestError> {
    let real_ip = extract_real_ip(&req)?;

    if rate_limiter.0.check_key(&real_ip).is_err() {
        error!("Rate limit exceeded for heartbeat for ip: {}", real_ip);
        return Err(RequestError::RateLimitExceeded);
    }

    let report = report.into_inner();
    let endpoint = parse_address(&report.address)?;

    if let Some(info) = &report.info {
        if info.address != endpoint {
            error!("Snapshot for {} carries info for {}", endpoint, info.address);
            return Err(RequestError::InvalidSnapshot(format!(
                "info address {} does not match {}",
                info.address, endpoint
            )));
        }
        if info.name.len() > storage.config().max_name_len {
            error!("Invalid name for {}: too long ({} bytes)", endpoint, info.name.len());
            return Err(RequestError::InvalidSnapshot("name too long".to_string()));
        }
    }

    let record = match &report.info {
        Some(server_info) => {
            let extension = extensions.for_app(server_info.app_id);
            let record = storage.insert_info(server_info.clone(), extension.clone());
            if record.game_extension().name() != extension.name() {
                info!(
                    "Game of {} changed, switching to {}",
                    endpoint,
                    extension.name()
                );
                record.set_game_extension(extension);
            }
            record
        }
        None => storage.get_or_insert(endpoint, extensions.fallback()),
    };

    debug!(
        "Snapshot for {}: info={} players={} rules={}",
        endpoint,
        report.info.is_some(),
        report.players.as_ref().map_or(0, Vec::len),
        report.rules.as_ref().map_or(0, Vec::len)
    );

    record.set_request_timestamp(unix_millis());
    record.set_retries(0);
    record.set_status(None);
    record.update(report.info, report.players, report.rules);

    Ok(HttpResponse::Ok().finish())
}
