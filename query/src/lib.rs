//! # UT2004 Server Query Library
//!
//! This library implements the client side of the Unreal Engine 2 server query
//! protocol. A query asks a server for its basic info, its rule list and its
//! player list over UDP, and interprets the answers.
//!
//! ## Architecture Overview
//!
//! Many queries share a single socket. Responses carry no request identifier,
//! only the sender's address, so the pieces fit together like this:
//!
//! ### Session
//! A [`Session`] owns the socket and a background receive loop. Each call to
//! [`Session::query`] registers itself for one server address, sends the
//! commands it needs and collects answers until it is satisfied, its timeout
//! passes or its caller cancels it.
//!
//! ### Registry
//! A query claims the response kinds it asks for on its server's address.
//! The receive loop parses the header of every datagram and hands it to the
//! query holding that kind on that sender. Queries whose kinds overlap on the
//! same address take turns, so no answer is seen by two queries.
//!
//! ### Interpretation
//! Raw player records are split into players, spectators and team summaries by
//! the [`roster`] module. The [`report`] module flattens everything into
//! serializable reports for console or JSON output.
//!
//! ## Module Organization
//!
//! ### Protocol Module (`protocol`)
//! Command codes and the wire layout of every request and response, built on
//! the `ue2` codec.
//!
//! ### Options Module (`options`)
//! Query kinds, timeouts, completion policy and session configuration.
//!
//! ### Session Module (`session`)
//! The shared socket, the receive loop and the per-query aggregation.
//!
//! ### Roster Module (`roster`)
//! Team and spectator classification of the player list.
//!
//! ### Report Module (`report`)
//! Per-server reports and formatters.
//!
//! ## Example
//!
//! ```no_run
//! use query::{QueryOptions, Session};
//!
//! # async fn run() -> Result<(), query::QueryError> {
//! let session = Session::new().await?;
//! let addr = "203.0.113.7:7778".parse().unwrap();
//!
//! let details = session
//!     .query(addr, QueryOptions::default().with_rules().with_players())
//!     .await?;
//!
//! if let Some(info) = &details.info {
//!     println!("{} on {}", info.server_name, info.map_name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod options;
pub mod protocol;
pub mod registry;
pub mod report;
pub mod roster;
pub mod session;

pub use error::QueryError;
pub use options::{Completeness, Completion, QueryKinds, QueryOptions, SessionConfig};
pub use session::{ServerDetails, Session, SessionStats};
