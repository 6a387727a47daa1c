//! Integration tests for the query session against a loopback server
//!
//! These tests run a small fake UT2004 server on 127.0.0.1 and drive real
//! queries through a shared session socket.

use bytes::{BufMut, BytesMut};
use query::protocol::{Command, Header, PlayerRecord, Rule, ServerInfo};
use query::{Completeness, Completion, QueryError, QueryKinds, QueryOptions, Session};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use ue2::{ColorizedString, Encode, Rgb};

/// How the fake server answers.
#[derive(Clone, Default)]
struct Behavior {
    /// Send rules in one datagram per rule.
    split_rules: bool,
    /// Send a datagram too short for a header before each answer.
    garbage_first: bool,
    /// Never answer player requests.
    skip_players: bool,
}

fn server_info() -> ServerInfo {
    let mut name = ColorizedString::plain("");
    name.push_color(Rgb::new(0, 128, 255)).push_str("Loopback CTF");

    ServerInfo {
        server_id: 1,
        ip: "127.0.0.1".to_string(),
        port: 7777,
        query_port: 7778,
        server_name: name,
        map_name: "CTF-FaceClassic".into(),
        game_type: "xCTFGame".into(),
        current_players: 2,
        max_players: 16,
        ping: 0,
        flags: 0,
        skill_level: "5".to_string(),
    }
}

fn rules() -> Vec<Rule> {
    vec![
        Rule {
            key: "ServerMode".into(),
            value: "dedicated".into(),
        },
        Rule {
            key: "AdminName".into(),
            value: "aldehir".into(),
        },
        Rule {
            key: "GoalScore".into(),
            value: "3".into(),
        },
    ]
}

fn players() -> Vec<PlayerRecord> {
    let record = |index, name: &str, ping, score, stats_id| PlayerRecord {
        index,
        name: name.into(),
        ping,
        score,
        stats_id,
    };

    vec![
        record(0, "one", 5, 1, 1 << 29),
        record(1, "two", 3, 2, 1 << 30),
        record(2, "Red", 0, 10, 0),
        record(3, "Blue", 0, 7, 0),
    ]
}

fn datagram<T: Encode>(command: Command, items: &[T]) -> BytesMut {
    let mut buf = BytesMut::new();
    Header::request(command).encode(&mut buf).unwrap();
    for item in items {
        item.encode(&mut buf).unwrap();
    }
    buf
}

/// Binds a loopback socket and answers query commands until the test ends.
async fn spawn_server(behavior: Behavior) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind server socket");
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0u8; 64];
        loop {
            let Ok((len, from)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let Ok(header) = ue2::from_bytes::<Header>(&buf[..len]) else {
                continue;
            };

            let mut replies = Vec::new();
            if behavior.garbage_first {
                let mut garbage = BytesMut::new();
                garbage.put_u8(0x80);
                replies.push(garbage);
            }

            let (send_rules, send_players) = match header.command() {
                Some(Command::Ping) => {
                    replies.push(datagram(Command::Ping, &[server_info()]));
                    (false, false)
                }
                Some(Command::Rules) => (true, false),
                Some(Command::Players) => (false, true),
                Some(Command::RulesAndPlayers) => (true, true),
                None => (false, false),
            };

            if send_rules {
                if behavior.split_rules {
                    for rule in rules() {
                        replies.push(datagram(Command::Rules, &[rule]));
                    }
                } else {
                    replies.push(datagram(Command::Rules, &rules()));
                }
            }
            if send_players && !behavior.skip_players {
                replies.push(datagram(Command::Players, &players()));
            }

            for reply in replies {
                let _ = socket.send_to(&reply, from).await;
            }
        }
    });

    addr
}

/// A bound socket that never answers.
async fn silent_server() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

async fn loopback_session() -> Arc<Session> {
    let config = query::SessionConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        ..query::SessionConfig::default()
    };
    Arc::new(Session::bind(config).await.unwrap())
}

fn full_query() -> QueryOptions {
    QueryOptions::new()
        .with_kinds(QueryKinds::ALL)
        .with_timeout(Duration::from_secs(2))
}

/// QUERY LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    /// Tests that info, rules and players all arrive and decode
    #[tokio::test]
    async fn full_query_collects_every_kind() {
        let server = spawn_server(Behavior::default()).await;
        let session = loopback_session().await;

        let details = tokio_test::assert_ok!(session.query(server, full_query()).await);

        assert_eq!(details.received, QueryKinds::ALL);
        let info = details.info.as_ref().unwrap();
        assert_eq!(info.server_name.text, "Loopback CTF");
        assert_eq!(info.server_name.markers[0].color.hex(), "#0080ff");
        assert_eq!(info.map_name.text, "CTF-FaceClassic");
        assert_eq!(details.rules, rules());
        assert_eq!(details.players, players());

        let roster = details.roster();
        assert_eq!(roster.players.len(), 2);
        assert_eq!(roster.teams.len(), 2);
        assert_eq!(roster.teams[0].name.text, "Red");
        assert_eq!(roster.teams[1].score, 7);

        assert_eq!(session.pending_queries(), 0);
    }

    /// Tests that a silent server times out with no response
    #[tokio::test]
    async fn silent_server_yields_no_response() {
        let (_socket, addr) = silent_server().await;
        let session = loopback_session().await;

        let options = QueryOptions::new().with_timeout(Duration::from_millis(100));
        let result = session.query(addr, options).await;

        assert!(matches!(result, Err(QueryError::NoResponse)));
        assert_eq!(session.pending_queries(), 0);
    }

    /// Tests cancellation through the caller's token
    #[tokio::test]
    async fn cancellation_stops_query_and_deregisters() {
        let (_socket, addr) = silent_server().await;
        let session = loopback_session().await;
        let cancel = CancellationToken::new();

        let options = QueryOptions::new()
            .with_timeout(Duration::from_secs(10))
            .with_cancellation(cancel.clone());

        let handle = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.query(addr, options).await })
        };

        sleep(Duration::from_millis(50)).await;
        assert_eq!(session.pending_queries(), 1);

        cancel.cancel();
        let result = handle.await.unwrap();

        assert!(matches!(result, Err(QueryError::Canceled)));
        assert_eq!(session.pending_queries(), 0);
    }

    /// Tests that closing the session wakes waiting queries
    #[tokio::test]
    async fn close_fails_waiting_queries() {
        let (_socket, addr) = silent_server().await;
        let session = loopback_session().await;

        let handle = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                session
                    .query(addr, QueryOptions::new().with_timeout(Duration::from_secs(10)))
                    .await
            })
        };

        sleep(Duration::from_millis(50)).await;
        session.close();

        assert!(matches!(handle.await.unwrap(), Err(QueryError::SessionClosed)));
        assert!(matches!(
            session.query(addr, QueryOptions::new()).await,
            Err(QueryError::SessionClosed)
        ));
    }
    /// Tests that a failed send leaves nothing registered
    #[tokio::test]
    async fn send_failure_is_transport_error() {
        let session = loopback_session().await;
        let v6: SocketAddr = "[::1]:7778".parse().unwrap();

        let result = session.query(v6, QueryOptions::new()).await;

        assert!(matches!(result, Err(QueryError::Transport(_))));
        assert_eq!(session.pending_queries(), 0);
    }

    /// Tests that closing wakes a query still waiting for its turn
    #[tokio::test]
    async fn close_fails_queries_waiting_for_their_turn() {
        let (_socket, addr) = silent_server().await;
        let session = loopback_session().await;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let session = Arc::clone(&session);
            handles.push(tokio::spawn(async move {
                session
                    .query(addr, QueryOptions::new().with_timeout(Duration::from_secs(10)))
                    .await
            }));
        }

        sleep(Duration::from_millis(50)).await;
        assert_eq!(session.pending_queries(), 1);
        session.close();

        for handle in handles {
            assert!(matches!(handle.await.unwrap(), Err(QueryError::SessionClosed)));
        }
    }
}

/// CONCURRENCY TESTS
mod concurrency_tests {
    use super::*;

    /// Tests that two queries to one server each get only what they asked for
    #[tokio::test]
    async fn concurrent_queries_to_same_server_do_not_cross() {
        let server = spawn_server(Behavior::default()).await;
        let session = loopback_session().await;

        let ping = QueryOptions::new().with_timeout(Duration::from_secs(2));
        let rules = QueryOptions::new()
            .with_kinds(QueryKinds::RULES)
            .with_timeout(Duration::from_secs(2));

        let (ping_result, rules_result) =
            tokio::join!(session.query(server, ping), session.query(server, rules));

        let ping_details = ping_result.unwrap();
        assert_eq!(ping_details.received, QueryKinds::PING);
        assert!(ping_details.info.is_some());
        assert!(ping_details.rules.is_empty());

        let rules_details = rules_result.unwrap();
        assert_eq!(rules_details.received, QueryKinds::RULES);
        assert!(rules_details.info.is_none());
        assert_eq!(rules_details.rules.len(), 3);

        assert_eq!(session.pending_queries(), 0);
    }

    /// Tests that two queries for the same kinds each get one copy of the answer
    #[tokio::test]
    async fn same_kind_queries_to_same_server_do_not_cross() {
        let server = spawn_server(Behavior::default()).await;
        let session = loopback_session().await;

        let options = || {
            QueryOptions::new()
                .with_kinds(QueryKinds::RULES | QueryKinds::PLAYERS)
                .with_timeout(Duration::from_secs(2))
        };

        let (first, second) = tokio::join!(
            session.query(server, options()),
            session.query(server, options())
        );

        for details in [first.unwrap(), second.unwrap()] {
            assert_eq!(details.rules, rules());
            assert_eq!(details.players, players());
        }
        assert_eq!(session.pending_queries(), 0);
    }

    /// Tests same-kind queries that listen until their deadline
    #[tokio::test]
    async fn same_kind_deadline_queries_collect_only_their_own_answers() {
        let server = spawn_server(Behavior {
            split_rules: true,
            ..Behavior::default()
        })
        .await;
        let session = loopback_session().await;

        let options = || {
            QueryOptions::new()
                .with_kinds(QueryKinds::RULES)
                .with_timeout(Duration::from_millis(200))
                .with_completion(Completion::Deadline)
        };

        let (first, second) = tokio::join!(
            session.query(server, options()),
            session.query(server, options())
        );

        assert_eq!(first.unwrap().rules, rules());
        assert_eq!(second.unwrap().rules, rules());
        assert_eq!(session.pending_queries(), 0);
    }

    /// Tests many queries across several servers sharing one socket
    #[tokio::test]
    async fn many_servers_share_one_session() {
        let session = loopback_session().await;
        let mut handles = Vec::new();

        for _ in 0..8 {
            let server = spawn_server(Behavior::default()).await;
            let session = Arc::clone(&session);
            handles.push(tokio::spawn(async move {
                session.query(server, full_query()).await
            }));
        }

        for handle in handles {
            let details = handle.await.unwrap().unwrap();
            assert_eq!(details.received, QueryKinds::ALL);
        }
        assert_eq!(session.pending_queries(), 0);
    }
}

/// RESPONSE HANDLING TESTS
mod response_tests {
    use super::*;

    /// Tests that waiting for the deadline gathers split rule lists
    #[tokio::test]
    async fn deadline_completion_gathers_split_rules() {
        let server = spawn_server(Behavior {
            split_rules: true,
            ..Behavior::default()
        })
        .await;
        let session = loopback_session().await;

        let options = QueryOptions::new()
            .with_kinds(QueryKinds::RULES)
            .with_timeout(Duration::from_millis(300))
            .with_completion(Completion::Deadline);

        let details = session.query(server, options).await.unwrap();
        assert_eq!(details.rules, rules());
    }

    /// Tests that a malformed datagram is counted and does not stop the loop
    #[tokio::test]
    async fn malformed_datagram_is_skipped() {
        let server = spawn_server(Behavior {
            garbage_first: true,
            ..Behavior::default()
        })
        .await;
        let session = loopback_session().await;

        let options = QueryOptions::new().with_timeout(Duration::from_secs(2));
        let details = session.query(server, options).await.unwrap();
        assert!(details.info.is_some());

        let stats = session.stats();
        assert!(stats.malformed >= 1);
        assert!(stats.dispatched >= 1);
    }

    /// Tests all-or-nothing queries when a kind never arrives
    #[tokio::test]
    async fn strict_query_reports_missing_kinds() {
        let server = spawn_server(Behavior {
            skip_players: true,
            ..Behavior::default()
        })
        .await;
        let session = loopback_session().await;

        let options = full_query()
            .with_timeout(Duration::from_millis(200))
            .with_completeness(Completeness::AllOrNothing);

        match session.query(server, options).await {
            Err(QueryError::Incomplete { missing, partial }) => {
                assert_eq!(missing, QueryKinds::PLAYERS);
                assert!(partial.info.is_some());
                assert_eq!(partial.rules.len(), 3);
            }
            other => panic!("expected incomplete result, got {:?}", other),
        }
    }

    /// Tests that best-effort queries return the partial result instead
    #[tokio::test]
    async fn best_effort_query_returns_partial() {
        let server = spawn_server(Behavior {
            skip_players: true,
            ..Behavior::default()
        })
        .await;
        let session = loopback_session().await;

        let options = full_query().with_timeout(Duration::from_millis(200));
        let details = session.query(server, options).await.unwrap();

        assert_eq!(details.received, QueryKinds::PING | QueryKinds::RULES);
        assert!(details.players.is_empty());
    }

    /// Tests that an empty kind set is rejected without sending anything
    #[tokio::test]
    async fn empty_kinds_are_rejected() {
        let server = spawn_server(Behavior::default()).await;
        let session = loopback_session().await;

        let options = QueryOptions::new().with_kinds(QueryKinds::NONE);
        tokio_test::assert_err!(session.query(server, options).await);
        assert_eq!(session.stats().received, 0);
    }
}
