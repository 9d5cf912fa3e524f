use std::env;
use std::time::Duration;
use std::num::NonZeroU32;
use governor::Quota;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,

    // Rate limiting configs
    pub heartbeat_period_secs: u64,
    pub heartbeat_burst_limit: u32,
    pub server_list_period_secs: u64,
    pub server_list_burst_limit: u32,

    // Record defaults
    pub query_players: bool,
    pub query_rules: bool,
    pub max_name_len: usize,

    pub server_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            heartbeat_period_secs: 1,
            heartbeat_burst_limit: 100,
            server_list_period_secs: 1,
            server_list_burst_limit: 20,
            query_players: false,
            query_rules: false,
            max_name_len: 128,
            server_timeout_secs: 300, // 5 minutes
            sweep_interval_secs: 30,
        }
    }
}

fn var_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port: var_or("PORT", defaults.port),
            heartbeat_period_secs: var_or("HEARTBEAT_PERIOD_SECS", defaults.heartbeat_period_secs),
            heartbeat_burst_limit: var_or("HEARTBEAT_BURST_LIMIT", defaults.heartbeat_burst_limit),
            server_list_period_secs: var_or("SERVER_LIST_PERIOD_SECS", defaults.server_list_period_secs),
            server_list_burst_limit: var_or("SERVER_LIST_BURST_LIMIT", defaults.server_list_burst_limit),
            query_players: var_or("QUERY_PLAYERS", defaults.query_players),
            query_rules: var_or("QUERY_RULES", defaults.query_rules),
            max_name_len: var_or("MAX_NAME_LEN", defaults.max_name_len),
            server_timeout_secs: var_or("SERVER_TIMEOUT_SECS", defaults.server_timeout_secs),
            sweep_interval_secs: var_or("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs),
        }
    }

    pub fn bind(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Never zero; `tokio::time::interval` rejects a zero period.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn heartbeat_quota(&self) -> Quota {
        quota(self.heartbeat_period_secs, self.heartbeat_burst_limit)
    }

    pub fn server_list_quota(&self) -> Quota {
        quota(self.server_list_period_secs, self.server_list_burst_limit)
    }
}

// Zero values fall back to one request per second.
fn quota(period_secs: u64, burst: u32) -> Quota {
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(Duration::from_secs(period_secs))
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(burst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.bind(), "0.0.0.0:8080");
        assert!(!config.query_players);
        assert_eq!(config.server_timeout_secs, 300);
    }

    #[test]
    fn zero_quota_values_do_not_panic() {
        let config = Config {
            heartbeat_period_secs: 0,
            heartbeat_burst_limit: 0,
            ..Config::default()
        };
        let _ = config.heartbeat_quota();
        let _ = config.server_list_quota();
    }

    #[test]
    fn sweep_interval_is_never_zero() {
        let config = Config {
            sweep_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
        assert_eq!(Config::default().sweep_interval(), Duration::from_secs(30));
    }
}
