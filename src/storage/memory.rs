// src/storage/memory.rs
use dashmap::DashMap;
use log::debug;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use crate::config::Config;
use crate::extension::GameExtension;
use crate::models::server::ServerInfo;
use crate::record::ServerRecord;
use crate::utils::unix_millis;

/// All records known to this browsing session, keyed by endpoint.
pub struct ServerStorage {
    servers: DashMap<SocketAddr, Arc<ServerRecord>>,
    config: Config,
}

impl ServerStorage {
    pub fn new(config: Config) -> Self {
        Self {
            servers: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the record for `endpoint`, creating it if it is new.
    pub fn get_or_insert(
        &self,
        endpoint: SocketAddr,
        extension: Arc<dyn GameExtension>,
    ) -> Arc<ServerRecord> {
        self.servers
            .entry(endpoint)
            .or_insert_with(|| {
                debug!("Discovered server {}", endpoint);
                Arc::new(self.new_record(ServerRecord::new(endpoint, extension)))
            })
            .value()
            .clone()
    }

    /// Registers a server seen in a query result. An existing record keeps its
    /// state; the info is not merged here.
    pub fn insert_info(
        &self,
        info: ServerInfo,
        extension: Arc<dyn GameExtension>,
    ) -> Arc<ServerRecord> {
        let endpoint = info.address;
        self.servers
            .entry(endpoint)
            .or_insert_with(|| {
                debug!("Discovered server {} from info", endpoint);
                Arc::new(self.new_record(ServerRecord::from_info(info, extension)))
            })
            .value()
            .clone()
    }

    fn new_record(&self, record: ServerRecord) -> ServerRecord {
        record.set_query_players(self.config.query_players);
        record.set_query_rules(self.config.query_rules);
        record
    }

    pub fn get(&self, endpoint: &SocketAddr) -> Option<Arc<ServerRecord>> {
        self.servers.get(endpoint).map(|r| r.value().clone())
    }

    /// All records, sorted by endpoint for stable output.
    pub fn records(&self) -> Vec<Arc<ServerRecord>> {
        let mut records: Vec<_> = self.servers.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.endpoint());
        records
    }

    /// Consumes every record's modified flag and returns the ones that were set.
    pub fn take_modified(&self) -> Vec<Arc<ServerRecord>> {
        self.records()
            .into_iter()
            .filter(|r| r.consume_modified())
            .collect()
    }

    pub fn remove(&self, endpoint: &SocketAddr) -> Option<Arc<ServerRecord>> {
        self.servers.remove(endpoint).map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Drops records not queried within the configured timeout.
    pub fn cleanup_stale_servers(&self, now_millis: u64) {
        let timeout = self.config.server_timeout_secs.saturating_mul(1000);
        self.servers.retain(|endpoint, record| {
            let keep = now_millis.saturating_sub(record.request_timestamp()) < timeout;
            if !keep {
                debug!("Evicting stale server {}", endpoint);
            }
            keep
        });
    }
}

/// Runs `cleanup_stale_servers` every `period`, starting immediately.
pub async fn run_sweeper(storage: Arc<ServerStorage>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let before = storage.len();
        storage.cleanup_stale_servers(unix_millis());
        let evicted = before.saturating_sub(storage.len());
        if evicted > 0 {
            debug!("Sweeper evicted {} stale servers", evicted);
        }
    }
}
