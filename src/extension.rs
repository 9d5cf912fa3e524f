// src/extension.rs
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::cache::FieldCache;
use crate::models::server::{CellValue, Player, ServerInfo};
use crate::record::ServerRecord;

pub const QUAKE_LIVE_APP_ID: u32 = 282440;

#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionError {
    MalformedRule { name: String, value: String },
    Unavailable(String),
}

impl fmt::Display for ExtensionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRule { name, value } => {
                write!(f, "Malformed rule {}={:?}", name, value)
            }
            Self::Unavailable(reason) => write!(f, "Extension unavailable: {}", reason),
        }
    }
}

impl std::error::Error for ExtensionError {}

/// Game-specific interpretation of query results.
///
/// One implementation per supported game. A record holds the currently
/// assigned one and may have it swapped when the detected game changes.
pub trait GameExtension: Send + Sync {
    fn name(&self) -> &str;

    /// Computes the display value of a custom column for `record`.
    fn server_cell_value(
        &self,
        _record: &ServerRecord,
        _field: &str,
    ) -> Result<Option<CellValue>, ExtensionError> {
        Ok(None)
    }

    fn is_dedicated(&self, server_type: &str) -> bool {
        server_type == "Dedicated"
    }

    fn is_bot(&self, _player: &Player) -> bool {
        false
    }

    /// Raw slot count including reserved slots.
    fn max_clients(&self, info: &ServerInfo, _rules: &FieldCache<String>) -> Option<u32> {
        Some(info.max_players)
    }

    fn private_clients(&self, _info: &ServerInfo, _rules: &FieldCache<String>) -> u32 {
        0
    }
}

/// Plain Source-query game: custom columns are looked up as rules.
#[derive(Debug, Default)]
pub struct SourceExtension;

impl GameExtension for SourceExtension {
    fn name(&self) -> &str {
        "source"
    }

    fn server_cell_value(
        &self,
        record: &ServerRecord,
        field: &str,
    ) -> Result<Option<CellValue>, ExtensionError> {
        Ok(record.rule(field).map(CellValue::Text))
    }
}

#[derive(Debug, Default)]
pub struct QuakeLiveExtension;

const QL_GAME_TYPES: [(i64, &str); 12] = [
    (0, "FFA"),
    (1, "Duel"),
    (2, "Race"),
    (3, "TDM"),
    (4, "CA"),
    (5, "CTF"),
    (6, "1Flag"),
    (8, "Harvester"),
    (9, "FT"),
    (10, "Dom"),
    (11, "A&D"),
    (12, "RR"),
];

fn parse_rule<T: std::str::FromStr>(rules: &FieldCache<String>, name: &str) -> Option<T> {
    rules.get(name).and_then(|v| v.trim().parse().ok())
}

impl QuakeLiveExtension {
    fn game_type(&self, record: &ServerRecord) -> Result<Option<CellValue>, ExtensionError> {
        let Some(raw) = record.rule("g_gametype") else {
            return Ok(None);
        };
        let code: i64 = raw.trim().parse().map_err(|_| ExtensionError::MalformedRule {
            name: "g_gametype".to_string(),
            value: raw.clone(),
        })?;
        let label = QL_GAME_TYPES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, label)| CellValue::from(*label));
        Ok(label.or(Some(CellValue::Int(code))))
    }
}

impl GameExtension for QuakeLiveExtension {
    fn name(&self) -> &str {
        "quakelive"
    }

    fn server_cell_value(
        &self,
        record: &ServerRecord,
        field: &str,
    ) -> Result<Option<CellValue>, ExtensionError> {
        match field.to_lowercase().as_str() {
            "_gametype" => self.game_type(record),
            "_teamsize" => Ok(record
                .rule("teamsize")
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|size| *size > 0)
                .map(CellValue::Int)),
            _ => Ok(record.rule(field).map(CellValue::Text)),
        }
    }

    fn max_clients(&self, info: &ServerInfo, rules: &FieldCache<String>) -> Option<u32> {
        parse_rule(rules, "sv_maxclients").or(Some(info.max_players))
    }

    fn private_clients(&self, _info: &ServerInfo, rules: &FieldCache<String>) -> u32 {
        parse_rule(rules, "sv_privateClients").unwrap_or(0)
    }
}

/// Extensions by Steam app id, with a fallback for unknown games.
#[derive(Clone)]
pub struct Extensions {
    by_app: HashMap<u32, Arc<dyn GameExtension>>,
    fallback: Arc<dyn GameExtension>,
}

impl Default for Extensions {
    fn default() -> Self {
        Self::standard()
    }
}

impl Extensions {
    pub fn new(fallback: Arc<dyn GameExtension>) -> Self {
        Self {
            by_app: HashMap::new(),
            fallback,
        }
    }

    pub fn standard() -> Self {
        let mut extensions = Self::new(Arc::new(SourceExtension));
        extensions.register(QUAKE_LIVE_APP_ID, Arc::new(QuakeLiveExtension));
        extensions
    }

    pub fn register(&mut self, app_id: u32, extension: Arc<dyn GameExtension>) {
        debug!("Registering extension {} for app {}", extension.name(), app_id);
        self.by_app.insert(app_id, extension);
    }

    pub fn fallback(&self) -> Arc<dyn GameExtension> {
        self.fallback.clone()
    }

    pub fn for_app(&self, app_id: u32) -> Arc<dyn GameExtension> {
        self.by_app
            .get(&app_id)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::server::Rule;

    fn info(max_players: u32) -> ServerInfo {
        serde_json::from_value(serde_json::json!({
            "address": "10.0.0.1:27960",
            "name": "ql",
            "app_id": QUAKE_LIVE_APP_ID,
            "max_players": max_players,
            "server_type": "Dedicated",
        }))
        .unwrap()
    }

    fn ql_record(rules: &[(&str, &str)]) -> ServerRecord {
        let record = ServerRecord::from_info(info(16), Arc::new(QuakeLiveExtension));
        let rules = rules.iter().map(|(n, v)| Rule::new(*n, *v)).collect();
        record.update(None, None, Some(rules));
        record
    }

    #[test]
    fn registry_falls_back_for_unknown_apps() {
        let extensions = Extensions::standard();
        assert_eq!(extensions.for_app(QUAKE_LIVE_APP_ID).name(), "quakelive");
        assert_eq!(extensions.for_app(440).name(), "source");
    }

    #[test]
    fn default_dedicated_classification() {
        let ext = SourceExtension;
        assert!(ext.is_dedicated("Dedicated"));
        assert!(!ext.is_dedicated("Listen"));
    }

    #[test]
    fn quake_live_reads_slots_from_rules() {
        let rules: FieldCache<String> = vec![("sv_maxClients", "20"), ("sv_privateclients", "4")]
            .into_iter()
            .collect();
        let ext = QuakeLiveExtension;

        assert_eq!(ext.max_clients(&info(16), &rules), Some(20));
        assert_eq!(ext.private_clients(&info(16), &rules), 4);
        assert_eq!(ext.max_clients(&info(16), &FieldCache::new()), Some(16));
        assert_eq!(ext.private_clients(&info(16), &FieldCache::new()), 0);
    }

    #[test]
    fn quake_live_decodes_game_type() {
        let record = ql_record(&[("g_gametype", "4"), ("teamsize", "5")]);
        let ext = QuakeLiveExtension;

        assert_eq!(
            ext.server_cell_value(&record, "_GameType").unwrap(),
            Some(CellValue::from("CA"))
        );
        assert_eq!(
            ext.server_cell_value(&record, "_teamsize").unwrap(),
            Some(CellValue::Int(5))
        );
    }

    #[test]
    fn quake_live_rejects_malformed_game_type() {
        let record = ql_record(&[("g_gametype", "ca")]);
        let err = QuakeLiveExtension
            .server_cell_value(&record, "_gametype")
            .unwrap_err();
        assert_eq!(
            err,
            ExtensionError::MalformedRule {
                name: "g_gametype".to_string(),
                value: "ca".to_string()
            }
        );
    }
}
