//! Per-server reports and the formatters that print them.
//!
//! A [`ServerReport`] is the flattened, serializable view of one server:
//! address, status, info, rules, players and teams. Formatters receive reports
//! one at a time as queries finish.

use crate::roster::{Player, Team};
use crate::session::ServerDetails;
use serde::Serialize;
use std::io::{self, Write};
use std::net::SocketAddr;
use ue2::{ColorMarker, ColorizedString};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Status {
    pub success: bool,
    #[serde(rename = "msg")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorPoint {
    pub index: usize,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub hex: String,
}

impl From<&ColorMarker> for ColorPoint {
    fn from(marker: &ColorMarker) -> Self {
        Self {
            index: marker.at,
            color: Color {
                red: marker.color.red,
                green: marker.color.green,
                blue: marker.color.blue,
                hex: marker.color.hex(),
            },
        }
    }
}

fn color_points(text: &ColorizedString) -> Vec<ColorPoint> {
    text.markers.iter().map(ColorPoint::from).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlayerCount {
    pub current: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InfoReport {
    pub name: String,
    pub name_colors: Vec<ColorPoint>,
    pub map: String,
    pub map_colors: Vec<ColorPoint>,
    #[serde(rename = "gametype")]
    pub game_type: String,
    #[serde(rename = "gametype_colors")]
    pub game_type_colors: Vec<ColorPoint>,
    #[serde(rename = "player_count")]
    pub players: PlayerCount,
    pub skill_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub key: String,
    pub key_colors: Vec<ColorPoint>,
    pub value: String,
    pub value_colors: Vec<ColorPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerReport {
    pub index: i32,
    /// -1 when unassigned.
    pub team: i32,
    pub spectator: bool,
    pub name: String,
    pub name_colors: Vec<ColorPoint>,
    pub ping: i32,
    pub score: i32,
    pub stats_id: i32,
}

impl From<&Player> for PlayerReport {
    fn from(player: &Player) -> Self {
        Self {
            index: player.index,
            team: player.team.map_or(-1, i32::from),
            spectator: player.spectator,
            name: player.name.text.clone(),
            name_colors: color_points(&player.name),
            ping: player.ping,
            score: player.score,
            stats_id: player.stats_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamReport {
    pub index: usize,
    pub name: String,
    pub name_colors: Vec<ColorPoint>,
    pub score: i32,
}

impl From<&Team> for TeamReport {
    fn from(team: &Team) -> Self {
        Self {
            index: team.index,
            name: team.name.text.clone(),
            name_colors: color_points(&team.name),
            score: team.score,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerReport {
    /// As given by the user.
    pub address: String,
    pub ip: String,
    pub port: u16,
    pub query_port: u16,
    pub info: InfoReport,
    pub rules: Vec<RuleReport>,
    pub players: Vec<PlayerReport>,
    pub teams: Vec<TeamReport>,
    pub status: Status,
}

impl ServerReport {
    /// A report for a server that could not be resolved or queried.
    pub fn failure(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            status: Status {
                success: false,
                message: message.into(),
            },
            ..Self::default()
        }
    }

    /// A successful report for the server at `game_addr`, queried at
    /// `query_addr`.
    pub fn success(
        address: impl Into<String>,
        game_addr: SocketAddr,
        query_addr: SocketAddr,
        details: &ServerDetails,
    ) -> Self {
        let info = details
            .info
            .as_ref()
            .map(|info| InfoReport {
                name: info.server_name.text.clone(),
                name_colors: color_points(&info.server_name),
                map: info.map_name.text.clone(),
                map_colors: color_points(&info.map_name),
                game_type: info.game_type.text.clone(),
                game_type_colors: color_points(&info.game_type),
                players: PlayerCount {
                    current: info.current_players,
                    max: info.max_players,
                },
                skill_level: info.skill_level.clone(),
            })
            .unwrap_or_default();

        let rules = details
            .rules
            .iter()
            .map(|rule| RuleReport {
                key: rule.key.text.clone(),
                key_colors: color_points(&rule.key),
                value: rule.value.text.clone(),
                value_colors: color_points(&rule.value),
            })
            .collect();

        let roster = details.roster();

        Self {
            address: address.into(),
            ip: game_addr.ip().to_string(),
            port: game_addr.port(),
            query_port: query_addr.port(),
            info,
            rules,
            players: roster.players.iter().map(PlayerReport::from).collect(),
            teams: roster.teams.iter().map(TeamReport::from).collect(),
            status: Status {
                success: true,
                message: "success".to_string(),
            },
        }
    }
}

/// Receives reports as they complete and renders them.
pub trait Formatter {
    fn report(&mut self, report: ServerReport) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// Human-readable output. Failures go to the error stream.
pub struct ConsoleFormatter<W: Write, E: Write> {
    out: W,
    err: E,
    printed: usize,
}

impl<W: Write, E: Write> ConsoleFormatter<W, E> {
    pub fn new(out: W, err: E) -> Self {
        Self {
            out,
            err,
            printed: 0,
        }
    }
}

impl ConsoleFormatter<io::Stdout, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<W: Write, E: Write> Formatter for ConsoleFormatter<W, E> {
    fn report(&mut self, rpt: ServerReport) -> io::Result<()> {
        if self.printed > 0 {
            writeln!(self.out)?;
        }
        self.printed += 1;

        if !rpt.status.success {
            writeln!(self.err, "Error: {}", rpt.status.message)?;
            return Ok(());
        }

        let out = &mut self.out;
        writeln!(out, "{}", rpt.info.name)?;
        writeln!(out, "  Game: {}", rpt.info.game_type)?;
        writeln!(out, "  Map: {}", rpt.info.map)?;

        if rpt.teams.len() > 1 {
            writeln!(out, "  Teams:")?;
            for t in &rpt.teams {
                writeln!(out, "    {}: team={} score={}", t.name, t.index, t.score)?;
            }
        }

        writeln!(
            out,
            "  Players: {}/{}",
            rpt.info.players.current, rpt.info.players.max
        )?;
        for p in &rpt.players {
            writeln!(
                out,
                "    {}: index={} team={} spec={} score={} ping={}",
                p.name, p.index, p.team, p.spectator, p.score, p.ping
            )?;
        }

        if !rpt.rules.is_empty() {
            writeln!(out, "  Rules:")?;
            for rule in &rpt.rules {
                writeln!(out, "    {}: {}", rule.key, rule.value)?;
            }
        }

        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.err.flush()
    }
}

/// Collects every report and writes one `{"servers": [...]}` document on
/// flush.
pub struct JsonFormatter<W: Write> {
    out: W,
    reports: Vec<ServerReport>,
}

impl<W: Write> JsonFormatter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            reports: Vec::new(),
        }
    }
}

#[derive(Serialize)]
struct Document<'a> {
    servers: &'a [ServerReport],
}

impl<W: Write> Formatter for JsonFormatter<W> {
    fn report(&mut self, report: ServerReport) -> io::Result<()> {
        self.reports.push(report);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        let document = Document {
            servers: &self.reports,
        };
        serde_json::to_writer_pretty(&mut self.out, &document)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::QueryKinds;
    use crate::protocol::{PlayerRecord, Rule, ServerInfo};
    use crate::roster::RED_TEAM_FLAG;
    use ue2::Rgb;

    fn details() -> ServerDetails {
        let mut name = ColorizedString::plain("");
        name.push_color(Rgb::new(255, 0, 0)).push_str("Kokuei");

        ServerDetails {
            info: Some(ServerInfo {
                server_name: name,
                map_name: "CTF-Face".into(),
                game_type: "xCTFGame".into(),
                current_players: 1,
                max_players: 10,
                skill_level: "7".to_string(),
                ..ServerInfo::default()
            }),
            rules: vec![Rule {
                key: "ServerMode".into(),
                value: "dedicated".into(),
            }],
            players: vec![
                PlayerRecord {
                    index: 0,
                    name: "aldehir".into(),
                    ping: 48,
                    score: 12,
                    stats_id: RED_TEAM_FLAG | 5,
                },
                PlayerRecord {
                    index: 1,
                    name: "Red Team".into(),
                    ping: 0,
                    score: 2,
                    stats_id: 0,
                },
                PlayerRecord {
                    index: 2,
                    name: "Blue Team".into(),
                    ping: 0,
                    score: 1,
                    stats_id: 0,
                },
            ],
            received: QueryKinds::ALL,
        }
    }

    fn game_addr() -> SocketAddr {
        "10.0.0.5:7777".parse().unwrap()
    }

    fn query_addr() -> SocketAddr {
        "10.0.0.5:7778".parse().unwrap()
    }

    #[test]
    fn test_success_report() {
        let report = ServerReport::success("ctf.example:7777", game_addr(), query_addr(), &details());

        assert!(report.status.success);
        assert_eq!(report.ip, "10.0.0.5");
        assert_eq!(report.query_port, 7778);
        assert_eq!(report.info.name, "Kokuei");
        assert_eq!(report.info.name_colors[0].color.hex, "#ff0000");
        assert_eq!(report.players.len(), 1);
        assert_eq!(report.players[0].team, 0);
        assert_eq!(report.players[0].stats_id, 5);
        assert_eq!(report.teams.len(), 2);
    }

    #[test]
    fn test_console_output() {
        let report = ServerReport::success("ctf.example:7777", game_addr(), query_addr(), &details());
        let mut out = Vec::new();
        let mut err = Vec::new();

        {
            let mut formatter = ConsoleFormatter::new(&mut out, &mut err);
            formatter.report(report).unwrap();
            formatter
                .report(ServerReport::failure("bad:1", "Failed to query bad:2: no response"))
                .unwrap();
            formatter.flush().unwrap();
        }

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Kokuei\n  Game: xCTFGame\n  Map: CTF-Face\n"));
        assert!(out.contains("  Teams:\n    Red Team: team=0 score=2\n"));
        assert!(out.contains("  Players: 1/10\n    aldehir: index=0 team=0 spec=false score=12 ping=48\n"));
        assert!(out.contains("  Rules:\n    ServerMode: dedicated\n"));
        assert_eq!(
            String::from_utf8(err).unwrap(),
            "Error: Failed to query bad:2: no response\n"
        );
    }

    #[test]
    fn test_json_document() {
        let mut out = Vec::new();
        {
            let mut formatter = JsonFormatter::new(&mut out);
            formatter
                .report(ServerReport::success("ctf.example:7777", game_addr(), query_addr(), &details()))
                .unwrap();
            formatter
                .report(ServerReport::failure("bad:1", "lookup failed"))
                .unwrap();
            formatter.flush().unwrap();
        }

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let servers = value["servers"].as_array().unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0]["info"]["gametype"], "xCTFGame");
        assert_eq!(servers[0]["info"]["player_count"]["max"], 10);
        assert_eq!(servers[0]["players"][0]["name"], "aldehir");
        assert_eq!(servers[0]["status"]["msg"], "success");
        assert_eq!(servers[1]["status"]["success"], false);
    }
}
