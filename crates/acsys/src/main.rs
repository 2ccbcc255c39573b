mod cmd;
mod exit;
mod logging;
mod output;

use acsys_transport::{GatewayAddr, DEFAULT_GATEWAY};
use clap::Parser;

use crate::cmd::{Command, Context};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "acsys", version, about = "ACNET and DPM command line client")]
struct Cli {
    /// acnetd gateway as host[:port].
    #[arg(
        long,
        value_name = "ADDR",
        env = "ACSYS_GATEWAY",
        default_value = DEFAULT_GATEWAY,
        global = true
    )]
    gateway: GatewayAddr,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let ctx = Context {
        gateway: cli.gateway,
        format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
    };

    match cmd::run(cli.command, &ctx) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
