use clap::CommandFactory;
use clap_complete::generate;

use crate::app::AppContext;
use crate::cli::{Cli, CompletionsArgs};
use crate::config::redacted_toml;

pub fn handle_completions(args: &CompletionsArgs) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "backplane", &mut std::io::stdout());
    Ok(())
}

/// Print the effective settings and the registered resources.
pub fn handle_config(ctx: &AppContext) -> anyhow::Result<()> {
    let config = ctx.config()?;
    print!("{}", redacted_toml(&config.backplane)?);
    if !ctx.quiet() {
        println!();
        println!("# resources: {}", config.services.resources.join(", "));
    }
    Ok(())
}
