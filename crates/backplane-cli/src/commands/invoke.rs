use serde_json::Value;

use crate::app::AppContext;
use crate::cli::InvokeArgs;
use crate::errors::CliError;
use crate::helpers::parse_arg;
use crate::output::print_json;

pub fn handle_invoke(ctx: &AppContext, args: &InvokeArgs) -> anyhow::Result<()> {
    let services = ctx.services()?;
    let service_ctx = ctx.service_context(args.token.as_deref())?;
    let call_args: Vec<Value> = args.args.iter().map(|raw| parse_arg(raw)).collect();

    let result = services
        .safe_invoke(&args.module, &args.function, &service_ctx, &call_args)?
        .ok_or_else(|| {
            CliError::not_found(
                format!("Not implemented: {}.{}", args.module, args.function),
                "Hint: Run `backplane services` to list registered functions.",
            )
        })?;
    print_json(&result)
}

pub fn handle_services(ctx: &AppContext) -> anyhow::Result<()> {
    for name in ctx.services()?.list() {
        println!("{}", name);
    }
    Ok(())
}
