//! UDP query session: one socket, one receive loop, many concurrent queries.

use crate::error::QueryError;
use crate::options::{Completeness, Completion, QueryKinds, QueryOptions, SessionConfig};
use crate::protocol::{self, Command, PlayerRecord, Response, Rule, ServerInfo, VERSION};
use crate::registry::Registry;
use crate::roster::{classify, Roster};
use log::{debug, error, warn};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use ue2::{records, CodecError};

/// Everything a query collected from one server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerDetails {
    pub info: Option<ServerInfo>,
    pub rules: Vec<Rule>,
    pub players: Vec<PlayerRecord>,
    /// Kinds that arrived at least once.
    pub received: QueryKinds,
}

impl ServerDetails {
    /// Players, spectators and teams, using the info's player count when
    /// info was collected.
    pub fn roster(&self) -> Roster {
        let count = match &self.info {
            Some(info) => info.current_players,
            None => i32::try_from(self.players.len()).unwrap_or(i32::MAX),
        };
        classify(&self.players, count)
    }

    /// Folds one response into the details. Responses of kinds outside
    /// `wanted` are ignored.
    fn merge(&mut self, response: &Response, wanted: QueryKinds) -> Result<(), CodecError> {
        let Some(command) = response.header.command() else {
            warn!(
                "received invalid command {} from {}",
                response.header.command, response.from
            );
            return Ok(());
        };

        let kind = QueryKinds::of_response(command);
        if !wanted.intersects(kind) {
            debug!("ignoring {:?} response from {}", command, response.from);
            return Ok(());
        }

        match command {
            Command::Ping => {
                self.info = Some(ue2::from_bytes(&response.payload)?);
            }
            Command::Rules => {
                for rule in records::<Rule>(&response.payload) {
                    self.rules.push(rule?);
                }
            }
            Command::Players => {
                for player in records::<PlayerRecord>(&response.payload) {
                    self.players.push(player?);
                }
            }
            // never sent back; filtered out above
            Command::RulesAndPlayers => {}
        }

        self.received |= kind;
        Ok(())
    }
}

/// Counters kept by the receive loop.
#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    dispatched: AtomicU64,
    unsolicited: AtomicU64,
    malformed: AtomicU64,
}

/// Snapshot of the receive loop counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Datagrams read from the socket.
    pub received: u64,
    /// Datagrams handed to at least one query.
    pub dispatched: u64,
    /// Datagrams no waiting query had asked for.
    pub unsolicited: u64,
    /// Datagrams whose header failed to decode.
    pub malformed: u64,
}

/// Terminal state of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    TimedOut,
    Canceled,
    Closed,
}

/// A query client bound to one local UDP socket.
///
/// The session is cheap to share: wrap it in an `Arc` and call
/// [`query`](Session::query) from as many tasks as needed, including several
/// against the same server.
pub struct Session {
    socket: Arc<UdpSocket>,
    registry: Arc<Registry>,
    counters: Arc<Counters>,
    config: SessionConfig,
    shutdown: CancellationToken,
    receiver: JoinHandle<()>,
}

impl Session {
    /// Binds with the default configuration.
    pub async fn new() -> Result<Self, QueryError> {
        Self::bind(SessionConfig::default()).await
    }

    /// Binds the socket and starts the receive loop.
    pub async fn bind(config: SessionConfig) -> Result<Self, QueryError> {
        let socket = Arc::new(UdpSocket::bind(config.bind_addr).await?);
        debug!("query session bound to {}", socket.local_addr()?);

        let registry = Arc::new(Registry::new());
        let counters = Arc::new(Counters::default());
        let shutdown = CancellationToken::new();

        let receiver = tokio::spawn(receive_loop(
            Arc::clone(&socket),
            Arc::clone(&registry),
            Arc::clone(&counters),
            shutdown.clone(),
            config.recv_buffer_size,
        ));

        Ok(Session {
            socket,
            registry,
            counters,
            config,
            shutdown,
            receiver,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Number of queries currently registered for responses.
    pub fn pending_queries(&self) -> usize {
        self.registry.len()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            received: self.counters.received.load(Ordering::Relaxed),
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            unsolicited: self.counters.unsolicited.load(Ordering::Relaxed),
            malformed: self.counters.malformed.load(Ordering::Relaxed),
        }
    }

    /// Stops the receive loop. Queries still waiting fail with
    /// [`QueryError::SessionClosed`].
    pub fn close(&self) {
        self.shutdown.cancel();
        self.registry.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Sends the commands for `options.kinds` to `addr` and collects the
    /// responses.
    ///
    /// The query is registered before anything is sent, and deregistered on
    /// every way out, including the returned future being dropped. A query
    /// whose kinds overlap another in-flight query to the same address waits
    /// for that one to finish; its timeout starts once it is registered.
    pub async fn query(
        &self,
        addr: SocketAddr,
        options: QueryOptions,
    ) -> Result<ServerDetails, QueryError> {
        if options.kinds.is_empty() {
            return Err(QueryError::NothingRequested);
        }
        if self.is_closed() {
            return Err(QueryError::SessionClosed);
        }

        // queries claiming the same kinds on `addr` run one after another
        let claim = self
            .registry
            .subscribe(addr, options.kinds, self.config.queue_depth);
        let mut subscription = tokio::select! {
            biased;

            _ = options.cancel.cancelled() => return Err(QueryError::Canceled),
            subscription = claim => match subscription {
                Some(subscription) => subscription,
                None => return Err(QueryError::SessionClosed),
            },
        };

        // a failed send drops the subscription on the way out
        for command in options.kinds.commands() {
            self.send_command(addr, command).await?;
        }

        let deadline = sleep_until(Instant::now() + options.timeout);
        tokio::pin!(deadline);

        let mut details = ServerDetails::default();

        let outcome = loop {
            tokio::select! {
                biased;

                _ = options.cancel.cancelled() => break Outcome::Canceled,
                _ = &mut deadline => break Outcome::TimedOut,
                response = subscription.recv() => {
                    let Some(response) = response else {
                        break Outcome::Closed;
                    };

                    if response.header.version != VERSION {
                        debug!(
                            "{} answered with version {}",
                            response.from, response.header.version
                        );
                    }

                    details.merge(&response, options.kinds)?;

                    if options.completion == Completion::FirstOfEach
                        && details.received.contains(options.kinds)
                    {
                        break Outcome::Completed;
                    }
                }
            }
        };

        drop(subscription);
        debug!(
            "query to {} finished: {:?}, received {}",
            addr, outcome, details.received
        );

        match outcome {
            Outcome::Completed => Ok(details),
            Outcome::Canceled => Err(QueryError::Canceled),
            Outcome::Closed => Err(QueryError::SessionClosed),
            Outcome::TimedOut => finish_at_deadline(details, &options),
        }
    }

    async fn send_command(&self, addr: SocketAddr, command: Command) -> Result<(), QueryError> {
        let packet = protocol::request(command)?;
        self.socket.send_to(&packet, addr).await?;
        debug!("sent {:?} to {}", command, addr);
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.receiver.abort();
    }
}

fn finish_at_deadline(
    details: ServerDetails,
    options: &QueryOptions,
) -> Result<ServerDetails, QueryError> {
    if details.received.is_empty() {
        return Err(QueryError::NoResponse);
    }

    let missing = options.kinds.difference(details.received);
    if !missing.is_empty() && options.completeness == Completeness::AllOrNothing {
        return Err(QueryError::Incomplete {
            missing,
            partial: Box::new(details),
        });
    }

    Ok(details)
}

/// Reads datagrams until shutdown and hands each to the queries waiting on
/// its sender.
async fn receive_loop(
    socket: Arc<UdpSocket>,
    registry: Arc<Registry>,
    counters: Arc<Counters>,
    shutdown: CancellationToken,
    buffer_size: usize,
) {
    let mut buffer = vec![0u8; buffer_size];

    loop {
        let (len, from) = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = socket.recv_from(&mut buffer) => match result {
                Ok(received) => received,
                Err(e) => {
                    // ICMP errors from earlier sends surface here on some platforms
                    error!("Error receiving packet: {}", e);
                    sleep(Duration::from_millis(10)).await;
                    continue;
                }
            },
        };

        counters.received.fetch_add(1, Ordering::Relaxed);

        let response = match Response::parse(from, &buffer[..len]) {
            Ok(response) => response,
            Err(e) => {
                counters.malformed.fetch_add(1, Ordering::Relaxed);
                warn!("could not decode header from {} ({})", from, e);
                continue;
            }
        };

        if registry.dispatch(response) == 0 {
            counters.unsolicited.fetch_add(1, Ordering::Relaxed);
            debug!("no query waiting on {} for that response", from);
        } else {
            counters.dispatched.fetch_add(1, Ordering::Relaxed);
        }
    }

    debug!("receive loop stopped");
}
