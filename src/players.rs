// src/players.rs
use std::fmt;

use serde::Serialize;

use crate::cache::FieldCache;
use crate::extension::GameExtension;
use crate::models::server::{Player, ServerInfo};

/// Whether a server has room for one more player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStatus {
    /// Player count or capacity unknown.
    Indeterminate,
    Open,
    /// Reported capacity reached, a reserved slot may still exist.
    Full,
    /// No public slot left.
    NoFreeSlot,
}

impl JoinStatus {
    /// Numeric form used by list views for sorting and coloring.
    pub fn code(self) -> i32 {
        match self {
            Self::Indeterminate => -1,
            Self::Open => 0,
            Self::Full => 1,
            Self::NoFreeSlot => 2,
        }
    }
}

/// Player counts derived from a record's snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerCountInfo {
    pub real_players: Option<u32>,
    pub bots: Option<u32>,
    pub max_players: Option<u32>,
    pub max_clients: Option<u32>,
    pub private_clients: u32,
}

impl PlayerCountInfo {
    pub fn recompute(
        info: Option<&ServerInfo>,
        players: Option<&[Player]>,
        rules: &FieldCache<String>,
        extension: &dyn GameExtension,
    ) -> Self {
        let Some(info) = info else {
            let counted = players.map(|p| count_roster(p, extension));
            return Self {
                real_players: counted.map(|(humans, _)| humans),
                bots: counted.map(|(_, bots)| bots),
                ..Self::default()
            };
        };

        let (real_players, bots) = match players {
            Some(roster) => count_roster(roster, extension),
            None => (info.players.saturating_sub(info.bots), info.bots),
        };

        Self {
            real_players: Some(real_players),
            bots: Some(bots),
            max_players: Some(info.max_players),
            max_clients: extension.max_clients(info, rules),
            private_clients: extension.private_clients(info, rules),
        }
    }

    /// The checks run in a fixed order: a server at absolute capacity reports
    /// `NoFreeSlot` even when it would also pass the `Open` check.
    pub fn join_status(&self) -> JoinStatus {
        let (Some(players), Some(max_players)) = (self.real_players, self.max_players) else {
            return JoinStatus::Indeterminate;
        };
        // Without a raw slot count the absolute capacity check is skipped.
        if let Some(max_clients) = self.max_clients {
            if players >= max_clients.saturating_sub(self.private_clients) {
                return JoinStatus::NoFreeSlot;
            }
        }
        if players < max_players {
            return JoinStatus::Open;
        }
        JoinStatus::Full
    }
}

/// Humans and bots on the roster, in one pass. Saturates at `u32::MAX`.
fn count_roster(players: &[Player], extension: &dyn GameExtension) -> (u32, u32) {
    players.iter().fold((0u32, 0u32), |(humans, bots), p| {
        if extension.is_bot(p) {
            (humans, bots.saturating_add(1))
        } else {
            (humans.saturating_add(1), bots)
        }
    })
}

impl fmt::Display for PlayerCountInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.real_players {
            Some(n) => write!(f, "{}", n)?,
            None => f.write_str("?")?,
        }
        if let Some(bots) = self.bots.filter(|b| *b > 0) {
            write!(f, "+{}", bots)?;
        }
        match self.max_players {
            Some(n) => write!(f, "/{}", n),
            None => f.write_str("/?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::SourceExtension;

    fn counts(real: Option<u32>, max_players: u32, max_clients: u32, private: u32) -> PlayerCountInfo {
        PlayerCountInfo {
            real_players: real,
            bots: Some(0),
            max_players: Some(max_players),
            max_clients: Some(max_clients),
            private_clients: private,
        }
    }

    #[test]
    fn join_status_no_free_public_slot() {
        assert_eq!(counts(Some(14), 16, 16, 2).join_status(), JoinStatus::NoFreeSlot);
    }

    #[test]
    fn join_status_open() {
        assert_eq!(counts(Some(10), 16, 16, 2).join_status(), JoinStatus::Open);
    }

    #[test]
    fn join_status_full_fallback() {
        assert_eq!(counts(Some(16), 16, 20, 0).join_status(), JoinStatus::Full);
    }

    #[test]
    fn join_status_unknown_players() {
        assert_eq!(counts(None, 16, 16, 2).join_status(), JoinStatus::Indeterminate);
        let unknown_cap = PlayerCountInfo {
            real_players: Some(3),
            ..PlayerCountInfo::default()
        };
        assert_eq!(unknown_cap.join_status(), JoinStatus::Indeterminate);
    }

    #[test]
    fn absolute_capacity_wins_over_open() {
        // 15 < 16 would be open, but only 15 public slots exist.
        assert_eq!(counts(Some(15), 16, 16, 1).join_status(), JoinStatus::NoFreeSlot);
        assert_eq!(counts(Some(16), 16, 16, 0).join_status(), JoinStatus::NoFreeSlot);
    }

    #[test]
    fn unknown_slot_count_skips_capacity_check() {
        let at_capacity = PlayerCountInfo {
            real_players: Some(16),
            bots: Some(0),
            max_players: Some(16),
            max_clients: None,
            private_clients: 0,
        };
        assert_eq!(at_capacity.join_status(), JoinStatus::Full);

        let with_room = PlayerCountInfo {
            real_players: Some(15),
            max_clients: None,
            private_clients: 4,
            ..at_capacity
        };
        assert_eq!(with_room.join_status(), JoinStatus::Open);
    }

    #[test]
    fn recompute_counts_bots_on_roster() {
        struct NamedBots;
        impl GameExtension for NamedBots {
            fn name(&self) -> &str {
                "named-bots"
            }
            fn is_bot(&self, player: &Player) -> bool {
                player.name.starts_with("[BOT]")
            }
        }

        let roster = vec![
            Player { name: "[BOT] Sarge".into(), score: 0, time: 1.0 },
            Player { name: "anarki".into(), score: 3, time: 9.0 },
            Player { name: "[BOT] Doom".into(), score: 1, time: 2.0 },
        ];
        let summary = PlayerCountInfo::recompute(None, Some(roster.as_slice()), &FieldCache::new(), &NamedBots);
        assert_eq!(summary.real_players, Some(1));
        assert_eq!(summary.bots, Some(2));
        assert_eq!(summary.join_status(), JoinStatus::Indeterminate);
    }

    #[test]
    fn private_slots_larger_than_capacity_saturate() {
        assert_eq!(counts(Some(0), 4, 4, 8).join_status(), JoinStatus::NoFreeSlot);
    }

    #[test]
    fn codes_match_list_view_convention() {
        assert_eq!(JoinStatus::Indeterminate.code(), -1);
        assert_eq!(JoinStatus::Open.code(), 0);
        assert_eq!(JoinStatus::Full.code(), 1);
        assert_eq!(JoinStatus::NoFreeSlot.code(), 2);
    }

    #[test]
    fn recompute_without_anything_is_unknown() {
        let summary = PlayerCountInfo::recompute(None, None, &FieldCache::new(), &SourceExtension);
        assert_eq!(summary, PlayerCountInfo::default());
        assert_eq!(summary.join_status(), JoinStatus::Indeterminate);
        assert_eq!(summary.to_string(), "?/?");
    }

    #[test]
    fn recompute_uses_info_counts_without_roster() {
        let info: ServerInfo = serde_json::from_value(serde_json::json!({
            "address": "127.0.0.1:27015",
            "name": "alpha",
            "players": 7,
            "bots": 2,
            "max_players": 12,
        }))
        .unwrap();

        let summary =
            PlayerCountInfo::recompute(Some(&info), None, &FieldCache::new(), &SourceExtension);
        assert_eq!(summary.real_players, Some(5));
        assert_eq!(summary.bots, Some(2));
        assert_eq!(summary.max_clients, Some(12));
        assert_eq!(summary.private_clients, 0);
        assert_eq!(summary.to_string(), "5+2/12");
        assert_eq!(summary.join_status(), JoinStatus::Open);
    }

    #[test]
    fn recompute_prefers_roster_over_info_counts() {
        let info: ServerInfo = serde_json::from_value(serde_json::json!({
            "address": "127.0.0.1:27015",
            "name": "alpha",
            "players": 7,
            "max_players": 12,
        }))
        .unwrap();
        let roster = vec![
            Player { name: "a".into(), score: 1, time: 10.0 },
            Player { name: "b".into(), score: 0, time: 3.0 },
        ];

        let summary = PlayerCountInfo::recompute(
            Some(&info),
            Some(roster.as_slice()),
            &FieldCache::new(),
            &SourceExtension,
        );
        assert_eq!(summary.real_players, Some(2));
        assert_eq!(summary.to_string(), "2/12");
    }
}
