use crate::cmd::{Context, NodeArgs};
use crate::exit::{acnet_error, CliResult, SUCCESS};
use crate::output::print_node;

pub fn run(args: NodeArgs, ctx: &Context) -> CliResult<i32> {
    let session = ctx.connect()?;
    let address = session
        .resolve_node(&args.name)
        .map_err(|err| acnet_error(&format!("lookup of {} failed", args.name), err))?;
    print_node(&args.name, address, ctx.format);
    session.close();
    Ok(SUCCESS)
}
