// src/record.rs
//! Last-known state of one remote server.
//!
//! Background query workers publish new snapshots through
//! [`ServerRecord::update`] while a foreground consumer reads fields and polls
//! [`ServerRecord::consume_modified`] to decide what to redraw. Snapshot data,
//! the rule cache, the derived player counts and the extender cache are
//! published together as one immutable snapshot behind an `ArcSwap`, so a
//! reader never sees caches cleared but not yet rebuilt. Only one writer per
//! record is expected at a time; the owner does not query an endpoint twice
//! concurrently.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};

use crate::cache::FieldCache;
use crate::extension::GameExtension;
use crate::models::server::{CellValue, GeoInfo, Player, Rule, ServerInfo};
use crate::players::{JoinStatus, PlayerCountInfo};

struct Snapshot {
    info: Option<Arc<ServerInfo>>,
    players: Option<Arc<Vec<Player>>>,
    rules: Option<Arc<Vec<Rule>>>,
    rule_cache: FieldCache<String>,
    player_count: PlayerCountInfo,
    // Filled lazily by readers; a fresh snapshot always starts empty.
    extender_cache: Mutex<FieldCache<Option<CellValue>>>,
}

impl Snapshot {
    fn build(
        info: Option<Arc<ServerInfo>>,
        players: Option<Arc<Vec<Player>>>,
        rules: Option<Arc<Vec<Rule>>>,
        extension: &dyn GameExtension,
    ) -> Self {
        let mut rule_cache = FieldCache::new();
        if let Some(rules) = &rules {
            for rule in rules.iter() {
                rule_cache.set(&rule.name, rule.value.clone());
            }
        }
        let player_count = PlayerCountInfo::recompute(
            info.as_deref(),
            players.as_deref().map(Vec::as_slice),
            &rule_cache,
            extension,
        );
        Self {
            info,
            players,
            rules,
            rule_cache,
            player_count,
            extender_cache: Mutex::new(FieldCache::new()),
        }
    }
}

pub struct ServerRecord {
    endpoint: SocketAddr,
    snapshot: ArcSwap<Snapshot>,
    extension: RwLock<Arc<dyn GameExtension>>,
    modified: AtomicBool,
    request_timestamp: AtomicU64,
    retries: AtomicU32,
    query_players: AtomicBool,
    query_rules: AtomicBool,
    buddy_count: RwLock<Option<u32>>,
    cached_name: RwLock<String>,
    geo_info: RwLock<Option<GeoInfo>>,
    status: RwLock<Option<String>>,
}

impl ServerRecord {
    pub fn new(endpoint: SocketAddr, extension: Arc<dyn GameExtension>) -> Self {
        Self::with_snapshot(endpoint, None, extension)
    }

    /// Creates a record from an info snapshot obtained before the record
    /// existed, e.g. from a master server response.
    pub fn from_info(info: ServerInfo, extension: Arc<dyn GameExtension>) -> Self {
        let endpoint = info.address;
        Self::with_snapshot(endpoint, Some(Arc::new(info)), extension)
    }

    fn with_snapshot(
        endpoint: SocketAddr,
        info: Option<Arc<ServerInfo>>,
        extension: Arc<dyn GameExtension>,
    ) -> Self {
        let snapshot = Snapshot::build(info, None, None, extension.as_ref());
        Self {
            endpoint,
            snapshot: ArcSwap::from_pointee(snapshot),
            extension: RwLock::new(extension),
            modified: AtomicBool::new(false),
            request_timestamp: AtomicU64::new(0),
            retries: AtomicU32::new(0),
            query_players: AtomicBool::new(false),
            query_rules: AtomicBool::new(false),
            buddy_count: RwLock::new(None),
            cached_name: RwLock::new(String::new()),
            geo_info: RwLock::new(None),
            status: RwLock::new(None),
        }
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Merges a query result into the record.
    ///
    /// `None` leaves the previous value in place; an empty list replaces it.
    /// Both field caches start over and the player counts are recomputed.
    pub fn update(
        &self,
        info: Option<ServerInfo>,
        players: Option<Vec<Player>>,
        rules: Option<Vec<Rule>>,
    ) {
        let current = self.snapshot.load_full();
        let info = info.map(Arc::new).or_else(|| current.info.clone());
        let players = players.map(Arc::new).or_else(|| current.players.clone());
        let rules = rules.map(Arc::new).or_else(|| current.rules.clone());

        let extension = self.game_extension();
        let snapshot = Snapshot::build(info, players, rules, extension.as_ref());
        debug!(
            "Updated {}: {} rules, players {}",
            self.endpoint,
            snapshot.rule_cache.len(),
            snapshot.player_count
        );
        self.snapshot.store(Arc::new(snapshot));
        self.mark_modified();
    }

    /// Rebuilds caches and counts from the current snapshot, e.g. after the
    /// game extension was replaced.
    pub fn refresh(&self) {
        self.update(None, None, None);
    }

    pub fn info(&self) -> Option<Arc<ServerInfo>> {
        self.snapshot.load().info.clone()
    }

    pub fn players(&self) -> Option<Arc<Vec<Player>>> {
        self.snapshot.load().players.clone()
    }

    pub fn rules(&self) -> Option<Arc<Vec<Rule>>> {
        self.snapshot.load().rules.clone()
    }

    pub fn rule(&self, name: &str) -> Option<String> {
        self.snapshot.load().rule_cache.get(name).cloned()
    }

    /// Number of distinct rule names in the current snapshot.
    pub fn rule_count(&self) -> usize {
        self.snapshot.load().rule_cache.len()
    }

    /// Number of extender values memoized since the last update.
    pub fn cached_extender_fields(&self) -> usize {
        self.snapshot.load().extender_cache.lock().len()
    }

    pub fn player_count(&self) -> PlayerCountInfo {
        self.snapshot.load().player_count.clone()
    }

    pub fn join_status(&self) -> JoinStatus {
        self.snapshot.load().player_count.join_status()
    }

    /// Display name: reported name, then the cached name, then the endpoint.
    pub fn name(&self) -> String {
        if let Some(info) = self.snapshot.load().info.as_ref() {
            return info.name.clone();
        }
        let cached = self.cached_name.read();
        if !cached.is_empty() {
            return cached.clone();
        }
        self.endpoint.to_string()
    }

    pub fn dedicated(&self) -> bool {
        match self.snapshot.load().info.as_ref() {
            Some(info) => self.game_extension().is_dedicated(&info.server_type),
            None => false,
        }
    }

    /// Value of a game-specific column, computed once per field per update.
    ///
    /// Returns `None` before the first info snapshot. A failed or empty
    /// extension answer is remembered as `None` until the next update.
    pub fn extender_field_value(&self, field: &str) -> Option<CellValue> {
        let snapshot = self.snapshot.load_full();
        snapshot.info.as_ref()?;
        if let Some(value) = snapshot.extender_cache.lock().get(field) {
            return value.clone();
        }

        // The extension may read this record, so it runs without the lock held.
        let extension = self.game_extension();
        let value = match extension.server_cell_value(self, field) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Extension {} failed on {} for {}: {}",
                    extension.name(),
                    field,
                    self.endpoint,
                    e
                );
                None
            }
        };

        let mut cache = snapshot.extender_cache.lock();
        if let Some(existing) = cache.get(field) {
            return existing.clone();
        }
        cache.set(field, value.clone());
        value
    }

    pub fn game_extension(&self) -> Arc<dyn GameExtension> {
        self.extension.read().clone()
    }

    /// Replaces the extension. Caches are kept until the next update.
    pub fn set_game_extension(&self, extension: Arc<dyn GameExtension>) {
        debug!("Assigning extension {} to {}", extension.name(), self.endpoint);
        *self.extension.write() = extension;
    }

    /// Returns whether the record changed since the last call, clearing the flag.
    pub fn consume_modified(&self) -> bool {
        self.modified.swap(false, Ordering::AcqRel)
    }

    pub fn mark_modified(&self) {
        self.modified.swap(true, Ordering::AcqRel);
    }

    pub fn request_timestamp(&self) -> u64 {
        self.request_timestamp.load(Ordering::Acquire)
    }

    pub fn set_request_timestamp(&self, millis: u64) {
        self.request_timestamp.store(millis, Ordering::Release);
    }

    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::Acquire)
    }

    pub fn set_retries(&self, retries: u32) {
        self.retries.store(retries, Ordering::Release);
    }

    /// Returns the new retry count.
    pub fn increment_retries(&self) -> u32 {
        self.retries.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn query_players(&self) -> bool {
        self.query_players.load(Ordering::Acquire)
    }

    pub fn set_query_players(&self, enabled: bool) {
        self.query_players.store(enabled, Ordering::Release);
    }

    pub fn query_rules(&self) -> bool {
        self.query_rules.load(Ordering::Acquire)
    }

    pub fn set_query_rules(&self, enabled: bool) {
        self.query_rules.store(enabled, Ordering::Release);
    }

    pub fn buddy_count(&self) -> Option<u32> {
        *self.buddy_count.read()
    }

    pub fn set_buddy_count(&self, count: Option<u32>) {
        *self.buddy_count.write() = count;
    }

    pub fn cached_name(&self) -> String {
        self.cached_name.read().clone()
    }

    pub fn set_cached_name(&self, name: impl Into<String>) {
        *self.cached_name.write() = name.into();
    }

    pub fn geo_info(&self) -> Option<GeoInfo> {
        self.geo_info.read().clone()
    }

    pub fn set_geo_info(&self, geo: Option<GeoInfo>) {
        *self.geo_info.write() = geo;
    }

    pub fn status(&self) -> Option<String> {
        self.status.read().clone()
    }

    pub fn set_status(&self, status: Option<String>) {
        *self.status.write() = status;
    }
}

impl fmt::Debug for ServerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerRecord")
            .field("endpoint", &self.endpoint)
            .field("name", &self.name())
            .field("extension", &self.game_extension().name())
            .field("modified", &self.modified.load(Ordering::Relaxed))
            .finish()
    }
}
