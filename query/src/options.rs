//! Session and per-query configuration.

use crate::protocol::Command;
use std::fmt;
use std::net::SocketAddr;
use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long a query waits for responses unless told otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

/// Set of response kinds a query asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct QueryKinds(u8);

impl QueryKinds {
    pub const NONE: QueryKinds = QueryKinds(0);
    pub const PING: QueryKinds = QueryKinds(1 << 0);
    pub const RULES: QueryKinds = QueryKinds(1 << 1);
    pub const PLAYERS: QueryKinds = QueryKinds(1 << 2);
    pub const ALL: QueryKinds = QueryKinds(0b111);

    pub fn contains(self, other: QueryKinds) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: QueryKinds) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Kinds in `self` that are not in `other`.
    pub fn difference(self, other: QueryKinds) -> QueryKinds {
        QueryKinds(self.0 & !other.0)
    }

    /// Commands to put on the wire, in send order. Rules and players share a
    /// single command when both are wanted.
    pub fn commands(self) -> Vec<Command> {
        let mut commands = Vec::with_capacity(2);

        if self.contains(Self::PING) {
            commands.push(Command::Ping);
        }

        if self.contains(Self::RULES | Self::PLAYERS) {
            commands.push(Command::RulesAndPlayers);
        } else if self.contains(Self::RULES) {
            commands.push(Command::Rules);
        } else if self.contains(Self::PLAYERS) {
            commands.push(Command::Players);
        }

        commands
    }

    /// The kind a response with this command contributes, if any.
    pub fn of_response(command: Command) -> QueryKinds {
        match command {
            Command::Ping => Self::PING,
            Command::Rules => Self::RULES,
            Command::Players => Self::PLAYERS,
            Command::RulesAndPlayers => Self::NONE,
        }
    }
}

impl BitOr for QueryKinds {
    type Output = QueryKinds;

    fn bitor(self, rhs: QueryKinds) -> QueryKinds {
        QueryKinds(self.0 | rhs.0)
    }
}

impl BitOrAssign for QueryKinds {
    fn bitor_assign(&mut self, rhs: QueryKinds) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for QueryKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::PING, "ping"),
            (Self::RULES, "rules"),
            (Self::PLAYERS, "players"),
        ]
        .iter()
        .filter(|(kind, _)| self.contains(*kind))
        .map(|(_, name)| *name)
        .collect();

        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// When a query stops listening.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Completion {
    /// As soon as every requested kind has arrived at least once.
    #[default]
    FirstOfEach,
    /// Only at the deadline. Long rule and player lists are split over
    /// several datagrams, so this is the way to get all of them.
    Deadline,
}

/// What a query returns when the deadline hits with some kinds missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Completeness {
    /// Whatever arrived, as long as something did.
    #[default]
    BestEffort,
    /// [`QueryError::Incomplete`](crate::QueryError::Incomplete) unless every
    /// requested kind arrived.
    AllOrNothing,
}

/// Options for a single [`Session::query`](crate::Session::query) call.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub kinds: QueryKinds,
    pub timeout: Duration,
    pub completion: Completion,
    pub completeness: Completeness,
    pub cancel: CancellationToken,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            kinds: QueryKinds::PING,
            timeout: DEFAULT_TIMEOUT,
            completion: Completion::default(),
            completeness: Completeness::default(),
            cancel: CancellationToken::new(),
        }
    }
}

impl QueryOptions {
    /// Server info only, 250ms timeout.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(mut self) -> Self {
        self.kinds |= QueryKinds::RULES;
        self
    }

    pub fn with_players(mut self) -> Self {
        self.kinds |= QueryKinds::PLAYERS;
        self
    }

    /// Replaces the requested kinds.
    pub fn with_kinds(mut self, kinds: QueryKinds) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_completion(mut self, completion: Completion) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_completeness(mut self, completeness: Completeness) -> Self {
        self.completeness = completeness;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Socket-level settings of a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Local address for the query socket.
    pub bind_addr: SocketAddr,
    /// Receive buffer; datagrams longer than this are cut short by the OS.
    pub recv_buffer_size: usize,
    /// Responses buffered per in-flight query before further ones are dropped.
    pub queue_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            recv_buffer_size: 2048,
            queue_depth: 32,
        }
    }
}
