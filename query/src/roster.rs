//! Turns a raw player list into players, spectators and teams.
//!
//! Servers pack two conventions into the player list:
//!
//! - Bits 29 and 30 of `stats_id` mark team membership (red and blue).
//! - Entries past the reported player count are extras. Those with a ping
//!   are spectators. Some game types also append one entry per team, holding
//!   the team name and score, and those always report ping 0. The first extra
//!   with ping 0 therefore starts the team section.
//!
//! The ping test is the only signal the protocol offers, so a spectator whose
//! ping happens to read 0 will be taken for a team entry, along with every
//! extra after it.

use crate::protocol::PlayerRecord;
use serde::Serialize;
use ue2::ColorizedString;

pub const RED_TEAM_FLAG: i32 = 1 << 29;
pub const BLUE_TEAM_FLAG: i32 = 1 << 30;
pub const STATS_ID_MASK: i32 = 0x1fff_ffff;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Player {
    pub index: i32,
    pub name: ColorizedString,
    pub ping: i32,
    pub score: i32,
    /// `stats_id` with the team bits cleared.
    pub stats_id: i32,
    /// 0 or 1, `None` when unassigned.
    pub team: Option<u8>,
    pub spectator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Team {
    /// Position among the team entries.
    pub index: usize,
    pub name: ColorizedString,
    pub score: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Roster {
    pub players: Vec<Player>,
    pub teams: Vec<Team>,
}

impl Roster {
    pub fn spectators(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.spectator)
    }
}

pub fn team_from_stats_id(stats_id: i32) -> Option<u8> {
    if stats_id & RED_TEAM_FLAG != 0 {
        Some(0)
    } else if stats_id & BLUE_TEAM_FLAG != 0 {
        Some(1)
    } else {
        None
    }
}

/// Splits `records` into players and teams given the server's current
/// player count.
pub fn classify(records: &[PlayerRecord], current_player_count: i32) -> Roster {
    let count = usize::try_from(current_player_count).unwrap_or(0);
    let mut roster = Roster::default();

    let mut remaining = records.iter().enumerate();
    let mut team_start = None;

    for (position, record) in remaining.by_ref() {
        let mut player = Player {
            index: record.index,
            name: record.name.clone(),
            ping: record.ping,
            score: record.score,
            stats_id: record.stats_id & STATS_ID_MASK,
            team: team_from_stats_id(record.stats_id),
            spectator: false,
        };

        if position >= count {
            if record.ping == 0 {
                team_start = Some(record);
                break;
            }
            player.team = None;
            player.spectator = true;
        }

        roster.players.push(player);
    }

    let teams = team_start
        .into_iter()
        .chain(remaining.map(|(_, record)| record));
    for (index, record) in teams.enumerate() {
        roster.teams.push(Team {
            index,
            name: record.name.clone(),
            score: record.score,
        });
    }

    roster
}
