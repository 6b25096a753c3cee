use crate::config::{Action, ProbeOptions, TransmitOptions};
use crate::privilege::Privilege;
use crate::report::{self, Summary};
use anyhow::{anyhow, Context};
use hopscan_core::{Completion, ProbeBuilder, TransmitBuilder};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Run the hopscan application.
pub fn run_hopscan(action: &Action, privilege: &Privilege) -> anyhow::Result<()> {
    match action {
        Action::Probe(opts) => run_probe(opts, privilege),
        Action::Transmit(opts) => run_transmit(opts, privilege),
    }
}

fn run_probe(opts: &ProbeOptions, privilege: &Privilege) -> anyhow::Result<()> {
    let target = resolve(&opts.destination)?;
    let token = CancellationToken::new();
    let mut builder = ProbeBuilder::new(target)
        .source_addr(opts.source_addr)
        .protocol(opts.protocol)
        .first_ttl(opts.first_ttl)
        .max_ttl(opts.max_ttl)
        .max_attempts(opts.max_attempts)
        .timeout(opts.timeout)
        .src_port(opts.src_port)
        .dest_port(opts.dest_port)
        .cancellation_token(token.clone());
    if let Some(payload_size) = opts.payload_size {
        builder = builder.payload_size(payload_size);
    }
    let session = builder
        .build()
        .map_err(|err| session_error(err, privilege))?;
    Privilege::drop_privileges()?;
    println!(
        "hopscan to {} ({target}), {} hops max, {} probes",
        opts.destination, opts.max_ttl, opts.protocol
    );
    let detail = opts.verbosity > 0;
    let completion = run_until_interrupted(
        token,
        session.run(|event| println!("{}", report::probe_line(event, detail))),
    )?;
    tracing::debug!(?completion, "hop discovery complete");
    if completion == Completion::MaxTtlReached {
        println!("{} not reached in {} hops", target, opts.max_ttl);
    }
    Ok(())
}

fn run_transmit(opts: &TransmitOptions, privilege: &Privilege) -> anyhow::Result<()> {
    let target = resolve(&opts.destination)?;
    let token = CancellationToken::new();
    let mut builder = TransmitBuilder::new(target)
        .source_addr(opts.source_addr)
        .protocol(opts.protocol)
        .hops(opts.hops)
        .packets(opts.packets)
        .interval(opts.interval)
        .linger(opts.linger)
        .src_port(opts.src_port)
        .dest_port(opts.dest_port)
        .cancellation_token(token.clone());
    if let Some(payload_size) = opts.payload_size {
        builder = builder.payload_size(payload_size);
    }
    let session = builder
        .build()
        .map_err(|err| session_error(err, privilege))?;
    Privilege::drop_privileges()?;
    println!(
        "hopscan to {} ({target}), {} {} packets, ttl {}",
        opts.destination,
        opts.packets,
        opts.protocol,
        session.config().ttl.0
    );
    let detail = opts.verbosity > 0;
    let mut summary = Summary::default();
    let completion = run_until_interrupted(
        token,
        session.run(|event| {
            summary.record(event);
            if let Some(line) = report::transmit_line(event, detail) {
                println!("{line}");
            }
        }),
    )?;
    tracing::debug!(?completion, "transmit complete");
    println!("--- {} statistics ---", opts.destination);
    println!("{summary}");
    Ok(())
}

/// Run a session on a single threaded runtime, cancelling it on Ctrl-C.
fn run_until_interrupted<F>(token: CancellationToken, session: F) -> anyhow::Result<Completion>
where
    F: Future<Output = hopscan_core::Result<Completion>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let completion = runtime.block_on(async move {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupted");
                token.cancel();
            }
        });
        session.await
    })?;
    Ok(completion)
}

/// Explain a failure to open the raw sockets.
fn session_error(err: hopscan_core::Error, privilege: &Privilege) -> anyhow::Error {
    match err {
        hopscan_core::Error::PrivilegeRequired(_) if !privilege.has_privileges() => {
            anyhow::Error::new(err).context("hopscan must run as root or with the CAP_NET_RAW capability")
        }
        err => anyhow::Error::new(err),
    }
}

/// Resolve a destination to an `IPv4` address.
///
/// The first `IPv4` address returned by the system resolver is used.
fn resolve(destination: &str) -> anyhow::Result<Ipv4Addr> {
    if let Ok(addr) = Ipv4Addr::from_str(destination) {
        return Ok(addr);
    }
    dns_lookup::lookup_host(destination)
        .with_context(|| format!("failed to resolve destination: {destination}"))?
        .into_iter()
        .find_map(|addr| match addr {
            IpAddr::V4(addr) => Some(addr),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| anyhow!("no IPv4 address found for destination: {destination}"))
}

/// Configure logging to stderr.
///
/// The verbosity selects the default filter, `RUST_LOG` overrides it.
pub fn configure_logging(verbosity: u8) {
    let Some(default_filter) = log_filter(verbosity) else {
        return;
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

const fn log_filter(verbosity: u8) -> Option<&'static str> {
    match verbosity {
        0 => None,
        1 => Some("hopscan=debug,hopscan_core=debug"),
        _ => Some("hopscan=trace,hopscan_core=trace"),
    }
}
