use std::sync::atomic::AtomicBool;

use crate::cmd::{next_reply, parse_duration, timeout_ms, Context, PingArgs};
use crate::exit::{acnet_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::print_replies;

/// Level-0 ping: a single zero word to the node's ACNET task.
const PING: [u8; 2] = [0, 0];

pub fn run(args: PingArgs, ctx: &Context) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let destination = format!("ACNET@{}", args.node);

    let session = ctx.connect()?;
    let mut stream = session
        .request_single(&destination, &PING, timeout_ms(timeout))
        .map_err(|err| acnet_error("ping failed", err))?;

    let reply = next_reply(&mut stream, timeout, &AtomicBool::new(true))?
        .ok_or_else(|| CliError::new(FAILURE, format!("{destination} sent no reply")))?;
    print_replies(&destination, &[reply], ctx.format);
    session.close();
    Ok(SUCCESS)
}
