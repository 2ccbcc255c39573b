use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use acsys_acnet::{BusSession, Reply, ReplyStream, SessionConfig};
use acsys_transport::GatewayAddr;
use clap::{Args, Subcommand};
use tracing::debug;

use crate::exit::{acnet_error, CliError, CliResult, INTERNAL, TIMEOUT, USAGE};
use crate::output::OutputFormat;

pub mod node;
pub mod ping;
pub mod read;
pub mod request;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a node name to its trunk/node address.
    Node(NodeArgs),
    /// ACNET level ping of a node.
    Ping(PingArgs),
    /// Send a request to TASK@NODE and print the replies.
    Request(RequestArgs),
    /// Read devices through a DPM list.
    ///
    /// List messages are encoded as JSON, so the list service must speak
    /// the JSON list encoding. A DPM that only speaks its binary protocol
    /// will not understand the requests.
    Read(ReadArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Settings shared by every bus command.
#[derive(Debug, Clone)]
pub struct Context {
    pub gateway: GatewayAddr,
    pub format: OutputFormat,
}

impl Context {
    /// Open a bus session to the configured gateway.
    pub fn connect(&self) -> CliResult<BusSession> {
        debug!(gateway = %self.gateway, "connecting");
        BusSession::connect_with_config(SessionConfig::for_gateway(self.gateway.clone()))
            .map_err(|err| acnet_error(&format!("connect to {} failed", self.gateway), err))
    }
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Node(args) => node::run(args, ctx),
        Command::Ping(args) => ping::run(args, ctx),
        Command::Request(args) => request::run(args, ctx),
        Command::Read(args) => read::run(args, ctx),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct NodeArgs {
    /// Node name (e.g. CENTRA).
    pub name: String,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// Node name to ping.
    pub node: String,
    /// Reply timeout (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Destination as TASK@NODE.
    pub destination: String,
    /// Request payload as a string.
    #[arg(long, conflicts_with = "hex")]
    pub data: Option<String>,
    /// Request payload as hex digits (e.g. 0000).
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
    /// Reply timeout passed to the remote task (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
    /// Ask for multiple replies and stop after N of them.
    #[arg(long, value_name = "N")]
    pub multiple: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// DRF requests (e.g. M:OUTTMP@I).
    #[arg(required = true)]
    pub drf: Vec<String>,
    /// DPM node, or TASK@NODE. Default: discover one.
    #[arg(long, env = "ACSYS_DPM")]
    pub dpm: Option<String>,
    /// Exit after N items. Default: one per request.
    #[arg(long)]
    pub count: Option<usize>,
    /// Give up when no item arrives for this long (e.g. 10s).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `2s`, `150ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}

/// Duration as the millisecond count carried in a request.
pub fn timeout_ms(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Grace added to a remote timeout before the CLI stops waiting itself.
const LOCAL_GRACE: Duration = Duration::from_secs(1);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Poll `stream` for its next reply.
///
/// Returns `Ok(None)` when the stream ends or `running` is cleared. Fails
/// with a timeout when nothing arrives within `timeout` plus a short grace.
pub fn next_reply(
    stream: &mut ReplyStream,
    timeout: Duration,
    running: &AtomicBool,
) -> CliResult<Option<Reply>> {
    let deadline = Instant::now() + timeout + LOCAL_GRACE;
    loop {
        if !running.load(Ordering::SeqCst) {
            return Ok(None);
        }
        match stream.try_next() {
            Ok(Some(reply)) => return Ok(Some(reply)),
            Ok(None) if stream.is_finished() => return Ok(None),
            Ok(None) => {}
            Err(err) => return Err(acnet_error("request failed", err)),
        }
        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("no reply within {timeout:?}"),
            ));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert_eq!(parse_duration("0s").unwrap_err().code, USAGE);
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn timeouts_saturate_at_u32() {
        assert_eq!(timeout_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(timeout_ms(Duration::from_secs(u64::MAX / 1000)), u32::MAX);
    }
}
