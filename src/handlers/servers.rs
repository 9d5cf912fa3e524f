// src/handlers/servers.rs
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use crate::handlers::ServerListLimiter;
use crate::models::server::{CellValue, GeoInfo, Rule};
use crate::players::{JoinStatus, PlayerCountInfo};
use crate::record::ServerRecord;
use crate::storage::memory::ServerStorage;
use crate::utils::{extract_real_ip, parse_address, unix_millis, RequestError};

/// What the list view shows for one record.
#[derive(Debug, Serialize)]
pub struct ServerView {
    pub address: SocketAddr,
    pub name: String,
    pub dedicated: bool,
    pub map: Option<String>,
    pub game: Option<String>,
    pub extension: String,
    pub players: String,
    pub player_count: PlayerCountInfo,
    pub join_status: JoinStatus,
    pub join_code: i32,
    pub buddy_count: Option<u32>,
    pub geo: Option<GeoInfo>,
    pub status: Option<String>,
    pub retries: u32,
    pub query_players: bool,
    pub query_rules: bool,
    pub last_query: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Option<CellValue>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub rules: bool,
    /// Comma separated game-specific columns.
    #[serde(default)]
    pub fields: Option<String>,
}

impl ListQuery {
    fn field_names(&self) -> Vec<&str> {
        self.fields
            .as_deref()
            .map(|f| f.split(',').map(str::trim).filter(|f| !f.is_empty()).collect())
            .unwrap_or_default()
    }
}

impl ServerView {
    pub fn build(record: &ServerRecord, with_rules: bool, fields: &[&str]) -> Self {
        let info = record.info();
        let player_count = record.player_count();
        let join_status = player_count.join_status();
        Self {
            address: record.endpoint(),
            name: record.name(),
            dedicated: record.dedicated(),
            map: info.as_ref().map(|i| i.map.clone()),
            game: info.as_ref().map(|i| i.description.clone()),
            extension: record.game_extension().name().to_string(),
            players: player_count.to_string(),
            player_count,
            join_status,
            join_code: join_status.code(),
            buddy_count: record.buddy_count(),
            geo: record.geo_info(),
            status: record.status(),
            retries: record.retries(),
            query_players: record.query_players(),
            query_rules: record.query_rules(),
            last_query: record.request_timestamp(),
            rules: if with_rules {
                record.rules().map(|r| r.as_ref().clone())
            } else {
                None
            },
            fields: fields
                .iter()
                .map(|f| (f.to_string(), record.extender_field_value(f)))
                .collect(),
        }
    }
}

fn check_rate(
    req: &HttpRequest,
    rate_limiter: &ServerListLimiter,
    what: &str,
) -> Result<(), RequestError> {
    let peer_ip = extract_real_ip(req)?;
    if rate_limiter.0.check_key(&peer_ip).is_err() {
        error!("Rate limit exceeded for {} for ip: {}", what, peer_ip);
        return Err(RequestError::RateLimitExceeded);
    }
    Ok(())
}

fn views(records: &[Arc<ServerRecord>], query: &ListQuery) -> Vec<ServerView> {
    let fields = query.field_names();
    records
        .iter()
        .map(|r| ServerView::build(r, query.rules, &fields))
        .collect()
}

pub async fn get_servers(
    storage: web::Data<ServerStorage>,
    rate_limiter: web::Data<ServerListLimiter>,
    query: web::Query<ListQuery>,
    req: HttpRequest,
) -> Result<HttpResponse, RequestError> {
    check_rate(&req, &rate_limiter, "server list")?;

    storage.cleanup_stale_servers(unix_millis());
    let records = storage.records();
    debug!("Building server list response with {} servers", records.len());

    Ok(HttpResponse::Ok().json(views(&records, &query)))
}

/// Records changed since the previous call; each change is reported once.
pub async fn get_changed(
    storage: web::Data<ServerStorage>,
    rate_limiter: web::Data<ServerListLimiter>,
    query: web::Query<ListQuery>,
    req: HttpRequest,
) -> Result<HttpResponse, RequestError> {
    check_rate(&req, &rate_limiter, "changed list")?;

    let records = storage.take_modified();
    debug!("{} servers changed", records.len());

    Ok(HttpResponse::Ok().json(views(&records, &query)))
}

#[derive(Deserialize)]
pub struct AddressQuery {
    address: String,
}

fn find(storage: &ServerStorage, address: &str) -> Result<Arc<ServerRecord>, RequestError> {
    let endpoint = parse_address(address)?;
    storage.get(&endpoint).ok_or_else(|| {
        error!("Server not found for {}", endpoint);
        RequestError::ServerNotFound(endpoint)
    })
}

pub async fn delete_server(
    storage: web::Data<ServerStorage>,
    req: HttpRequest,
    query: web::Query<AddressQuery>,
    rate_limiter: web::Data<ServerListLimiter>,
) -> Result<HttpResponse, RequestError> {
    check_rate(&req, &rate_limiter, "server delete")?;

    let record = find(&storage, &query.address)?;
    storage.remove(&record.endpoint());
    debug!("Removed server {}", record.endpoint());
    Ok(HttpResponse::Ok().finish())
}

/// A failed query: bumps the retry counter and shows the reason.
pub async fn report_failure(
    storage: web::Data<ServerStorage>,
    req: HttpRequest,
    query: web::Query<AddressQuery>,
    rate_limiter: web::Data<ServerListLimiter>,
) -> Result<HttpResponse, RequestError> {
    check_rate(&req, &rate_limiter, "failure report")?;

    let record = find(&storage, &query.address)?;
    let retries = record.increment_retries();
    record.set_request_timestamp(unix_millis());
    record.set_status(Some("timeout".to_string()));
    record.mark_modified();
    debug!("Query of {} failed, {} retries", record.endpoint(), retries);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "retries": retries })))
}

#[derive(Deserialize)]
pub struct BuddyUpdate {
    address: String,
    count: Option<u32>,
}

pub async fn set_buddies(
    storage: web::Data<ServerStorage>,
    req: HttpRequest,
    body: web::Json<BuddyUpdate>,
    rate_limiter: web::Data<ServerListLimiter>,
) -> Result<HttpResponse, RequestError> {
    check_rate(&req, &rate_limiter, "buddy update")?;

    let record = find(&storage, &body.address)?;
    record.set_buddy_count(body.count);
    record.mark_modified();
    Ok(HttpResponse::Ok().finish())
}

#[derive(Deserialize)]
pub struct GeoUpdate {
    address: String,
    geo: Option<GeoInfo>,
}

pub async fn set_geo(
    storage: web::Data<ServerStorage>,
    req: HttpRequest,
    body: web::Json<GeoUpdate>,
    rate_limiter: web::Data<ServerListLimiter>,
) -> Result<HttpResponse, RequestError> {
    check_rate(&req, &rate_limiter, "geo update")?;

    let body = body.into_inner();
    let record = find(&storage, &body.address)?;
    record.set_geo_info(body.geo);
    record.mark_modified();
    Ok(HttpResponse::Ok().finish())
}
