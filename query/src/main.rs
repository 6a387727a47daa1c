use clap::{Parser, ValueEnum};
use log::{debug, info};
use query::protocol;
use query::report::{ConsoleFormatter, Formatter, JsonFormatter, ServerReport};
use query::{Completeness, Completion, QueryKinds, QueryOptions, Session, SessionConfig};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Plain,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Query UT2004 servers", long_about = None)]
struct Args {
    /// Servers to query, as host:port of the game port
    #[arg(required = true)]
    servers: Vec<String>,

    /// Query timeout in milliseconds
    #[arg(short = 't', long, default_value = "250")]
    timeout: u64,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "plain")]
    format: Format,

    /// Listen until the timeout to pick up split rule and player lists
    #[arg(long)]
    wait: bool,

    /// Report a server as failed unless info, rules and players all arrive
    #[arg(long)]
    strict: bool,

    /// Local address for the query socket
    #[arg(long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let session = Arc::new(
        Session::bind(SessionConfig {
            bind_addr: args.bind,
            ..SessionConfig::default()
        })
        .await?,
    );
    info!("Query socket bound to {}", session.local_addr()?);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Received Ctrl+C, canceling queries...");
                cancel.cancel();
            }
        });
    }

    let options = QueryOptions::new()
        .with_kinds(QueryKinds::ALL)
        .with_timeout(Duration::from_millis(args.timeout))
        .with_completion(if args.wait {
            Completion::Deadline
        } else {
            Completion::FirstOfEach
        })
        .with_completeness(if args.strict {
            Completeness::AllOrNothing
        } else {
            Completeness::BestEffort
        })
        .with_cancellation(cancel.clone());

    let (report_tx, mut report_rx) = mpsc::channel::<ServerReport>(args.servers.len().max(1));

    for server in args.servers {
        let session = Arc::clone(&session);
        let options = options.clone();
        let report_tx = report_tx.clone();
        let prefer_ipv6 = args.bind.is_ipv6();

        tokio::spawn(async move {
            let report = query_server(&session, server, options, prefer_ipv6).await;
            // receiver only goes away when main is already returning
            let _ = report_tx.send(report).await;
        });
    }
    drop(report_tx);

    let mut formatter: Box<dyn Formatter> = match args.format {
        Format::Plain => Box::new(ConsoleFormatter::stdio()),
        Format::Json => Box::new(JsonFormatter::new(io::stdout())),
    };

    while let Some(report) = report_rx.recv().await {
        formatter.report(report)?;
    }
    formatter.flush()?;

    let stats = session.stats();
    debug!(
        "{} datagrams received, {} dispatched, {} unsolicited, {} malformed",
        stats.received, stats.dispatched, stats.unsolicited, stats.malformed
    );

    session.close();
    Ok(())
}

/// Resolves `server`, queries the port after its game port and turns the
/// outcome into a report.
async fn query_server(
    session: &Session,
    server: String,
    options: QueryOptions,
    prefer_ipv6: bool,
) -> ServerReport {
    let game_addr = match resolve(&server, prefer_ipv6).await {
        Ok(addr) => addr,
        Err(e) => {
            let message = format!("Failed to resolve {}: {}", server, e);
            return ServerReport::failure(server, message);
        }
    };

    let Some(query_addr) = protocol::query_addr(game_addr) else {
        let message = format!("No query port after {} for {}", game_addr.port(), server);
        return ServerReport::failure(server, message);
    };

    debug!("Querying {} at {}", server, query_addr);

    match session.query(query_addr, options).await {
        Ok(details) => ServerReport::success(server, game_addr, query_addr, &details),
        Err(e) => {
            let message = format!("Failed to query {}: {}", query_addr, e);
            ServerReport::failure(server, message)
        }
    }
}

/// Picks the first resolved address in the socket's family, falling back to
/// the first of any family.
async fn resolve(server: &str, prefer_ipv6: bool) -> io::Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = lookup_host(server).await?.collect();

    addrs
        .iter()
        .find(|addr| addr.is_ipv6() == prefer_ipv6)
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses found"))
}
