//! Bootstrap a link to the engine and probe address pairs.
//!
//! Demonstrates:
//! - Starting a deferred handle before the engine is up
//! - Waiting for readiness under a deadline
//! - Running a liveness check over the handle
//!
//! Usage:
//!   cargo run --example probe -- <socket> <source> <destination>...
//!   cargo run --example probe -- /run/engine/api.sock 10.0.0.1/24 10.0.0.2 --debug

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::{Context, bail};
use dataplane_link::{CallContext, Handle, LivenessOptions, Prober};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const READY_TIMEOUT: Duration = Duration::from_secs(10);
const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Args
// ============================================================================

struct Args {
    debug: bool,
    socket: String,
    source: String,
    destinations: Vec<String>,
}

impl Args {
    fn parse() -> anyhow::Result<Self> {
        let mut debug = false;
        let mut positional = Vec::new();
        for arg in std::env::args().skip(1) {
            if arg == "--debug" {
                debug = true;
            } else {
                positional.push(arg);
            }
        }

        if positional.len() < 3 {
            bail!("usage: probe <socket> <source> <destination>... [--debug]");
        }
        let destinations = positional.split_off(2);
        let source = positional.pop().context("missing source")?;
        let socket = positional.pop().context("missing socket")?;

        Ok(Self {
            debug,
            socket,
            source,
            destinations,
        })
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse()?;
    init_logging(args.debug);

    let scope = CallContext::new();
    let handle = Handle::builder()
        .socket_path(&args.socket)
        .bootstrap(&scope)?;

    println!("Waiting for engine at {} ...", args.socket);
    handle
        .wait_ready(&CallContext::new().with_timeout(READY_TIMEOUT))
        .await
        .with_context(|| format!("engine at {} not ready", args.socket))?;
    println!("Engine ready");

    let prober = Prober::new(LivenessOptions::default());
    let cx = CallContext::new().with_timeout(CHECK_TIMEOUT);
    println!("Probe interval: {:?}", prober.interval_for(&cx));

    let sources = [args.source.as_str()];
    let destinations: Vec<&str> = args.destinations.iter().map(String::as_str).collect();
    let alive = prober.check(&cx, &handle, &sources, &destinations).await;
    println!("Alive: {alive}");

    scope.cancel();
    Ok(())
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "dataplane_link=debug"
    } else {
        "dataplane_link=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
