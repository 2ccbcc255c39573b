use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use acsys_dpm::{JsonCodec, ListItem, ListOptions, ListSession, Tag};
use tracing::debug;

use crate::cmd::{install_ctrlc_handler, parse_duration, Context, ReadArgs};
use crate::exit::{list_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::print_items;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub fn run(args: ReadArgs, ctx: &Context) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let wanted = args.count.unwrap_or(args.drf.len());

    let bus = Arc::new(ctx.connect()?);
    let options = ListOptions {
        target: args.dpm.clone(),
        ..ListOptions::default()
    }
    .polling();
    let mut list = ListSession::connect(Arc::clone(&bus), JsonCodec, options)
        .map_err(|err| list_error("open list failed", err))?;
    debug!(task = list.dpm_task(), list_id = list.list_id(), "list opened");

    for (tag, drf) in args.drf.iter().enumerate() {
        list.add_entry(tag as Tag, drf.as_str());
    }
    list.start(None)
        .map_err(|err| list_error("start list failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let drf = |tag: Tag| args.drf.get(tag as usize).map(String::as_str).unwrap_or("?");
    let mut received = 0usize;
    let mut last_item = Instant::now();
    let outcome = loop {
        if received >= wanted || !running.load(Ordering::SeqCst) {
            break Ok(());
        }

        let batch = match list
            .pending()
            .take(wanted - received)
            .collect::<acsys_dpm::Result<Vec<ListItem>>>()
        {
            Ok(batch) => batch,
            Err(err) => break Err(list_error("read failed", err)),
        };
        if batch.is_empty() {
            if list.is_ended() {
                break Ok(());
            }
            if last_item.elapsed() >= timeout {
                break Err(CliError::new(
                    TIMEOUT,
                    format!("no data within {timeout:?}"),
                ));
            }
            thread::sleep(POLL_INTERVAL);
            continue;
        }

        received += batch.len();
        last_item = Instant::now();
        print_items(&batch, drf, ctx.format);
    };

    list.close();
    bus.close();
    outcome.map(|()| SUCCESS)
}
