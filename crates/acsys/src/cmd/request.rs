use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::cmd::{
    install_ctrlc_handler, next_reply, parse_duration, timeout_ms, Context, RequestArgs,
};
use crate::exit::{acnet_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::print_replies;

pub fn run(args: RequestArgs, ctx: &Context) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = resolve_payload(&args)?;
    if args.multiple == Some(0) {
        return Err(CliError::new(USAGE, "--multiple must be at least 1"));
    }

    let session = ctx.connect()?;
    let mut stream = match args.multiple {
        Some(_) => session.request_stream(&args.destination, &payload, timeout_ms(timeout)),
        None => session.request_single(&args.destination, &payload, timeout_ms(timeout)),
    }
    .map_err(|err| acnet_error("request failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    if args.multiple.is_some() {
        install_ctrlc_handler(running.clone())?;
    }

    let limit = args.multiple.unwrap_or(1);
    let mut printed = 0usize;
    while printed < limit {
        let Some(reply) = next_reply(&mut stream, timeout, &running)? else {
            break;
        };
        print_replies(&args.destination, &[reply], ctx.format);
        printed += 1;
    }

    // Dropping the stream releases its request id.
    drop(stream);
    session.close();

    if printed == 0 {
        return Err(CliError::new(
            FAILURE,
            format!("{} sent no reply", args.destination),
        ));
    }
    Ok(SUCCESS)
}

fn resolve_payload(args: &RequestArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    Ok(Vec::new())
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);
    if !digits.is_ascii() {
        return Err(CliError::new(USAGE, format!("--hex is not valid hex: {input}")));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "--hex needs an even number of digits"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("--hex is not valid hex: {input}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(data: Option<&str>, hex: Option<&str>) -> RequestArgs {
        RequestArgs {
            destination: "ACNET@CENTRA".to_string(),
            data: data.map(str::to_string),
            hex: hex.map(str::to_string),
            timeout: "2s".to_string(),
            multiple: None,
        }
    }

    #[test]
    fn hex_payloads() {
        assert_eq!(parse_hex("0001ff").unwrap(), vec![0x00, 0x01, 0xff]);
        assert_eq!(parse_hex("0x00 01").unwrap(), vec![0x00, 0x01]);
        assert_eq!(parse_hex("de:ad").unwrap(), vec![0xde, 0xad]);
        assert!(parse_hex("abc").is_err());
        assert_eq!(parse_hex("zz").unwrap_err().code, USAGE);
    }

    #[test]
    fn payload_sources() {
        assert_eq!(resolve_payload(&args(Some("hi"), None)).unwrap(), b"hi");
        assert_eq!(resolve_payload(&args(None, Some("0000"))).unwrap(), vec![0, 0]);
        assert!(resolve_payload(&args(None, None)).unwrap().is_empty());
    }
}
