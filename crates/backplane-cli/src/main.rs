//! Backplane CLI - pluggable storage, queue and auth backends
//!
//! This is the command-line interface for Backplane. It exposes the
//! configured backends and the service registry of the core library.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod helpers;
mod output;

use clap::Parser;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use backplane_core::VERSION;

use crate::app::AppContext;
use crate::cli::{AuthCommand, Cli, Commands, QueueCommand, RecordsCommand};
use crate::commands::{auth, init, invoke, misc, queue, records};
use crate::errors::exit_code_for;
use crate::output::print_error;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let ctx = AppContext::new(&cli);

    if let Err(e) = run(&ctx, &cli) {
        let error_msg = format!("{}", e);
        let (message, hint) = split_hint(&error_msg);
        print_error(message, hint);
        std::process::exit(exit_code_for(&e));
    }
}

/// Log to stderr so command output on stdout stays machine-readable.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to set tracing subscriber: {}", e);
    }
}

/// Split a trailing "Hint: ..." line off an error message.
fn split_hint(error: &str) -> (&str, Option<&str>) {
    match error.find("\nHint:") {
        Some(idx) => (&error[..idx], Some(&error[idx + 1..])),
        None => (error, None),
    }
}

fn run(ctx: &AppContext, cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Init(args)) => {
            init::handle_init(ctx, args)?;
        }
        Some(Commands::Config) => {
            misc::handle_config(ctx)?;
        }
        Some(Commands::Records(command)) => match command {
            RecordsCommand::Put(args) => records::handle_put(ctx, args)?,
            RecordsCommand::Get(args) => records::handle_get(ctx, args)?,
            RecordsCommand::List(args) => records::handle_list(ctx, args)?,
            RecordsCommand::Update(args) => records::handle_update(ctx, args)?,
            RecordsCommand::Delete(args) => records::handle_delete(ctx, args)?,
        },
        Some(Commands::Queue(command)) => match command {
            QueueCommand::Send(args) => queue::handle_send(ctx, args)?,
            QueueCommand::Receive(args) => queue::handle_receive(ctx, args)?,
            QueueCommand::Count(args) => queue::handle_count(ctx, args)?,
            QueueCommand::Listen(args) => queue::handle_listen(ctx, args)?,
        },
        Some(Commands::Auth(command)) => match command {
            AuthCommand::Register(args) => auth::handle_register(ctx, args)?,
            AuthCommand::Login(args) => auth::handle_login(ctx, args)?,
            AuthCommand::Whoami(args) => auth::handle_whoami(ctx, args)?,
            AuthCommand::Refresh(args) => auth::handle_refresh(ctx, args)?,
            AuthCommand::Logout(args) => auth::handle_logout(ctx, args)?,
        },
        Some(Commands::Invoke(args)) => {
            invoke::handle_invoke(ctx, args)?;
        }
        Some(Commands::Services) => {
            invoke::handle_services(ctx)?;
        }
        Some(Commands::Completions(args)) => {
            misc::handle_completions(args)?;
        }
        None => {
            println!("Backplane v{}", VERSION);
            println!("\nQuickstart:");
            println!("  backplane init");
            println!("  backplane records put config '{{\"name\": \"alpha\"}}'");
            println!("  backplane records list config");
            println!("  backplane invoke config_service get_all_config");
            println!("\nRun `backplane --help` for full usage.");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_hint() {
        assert_eq!(
            split_hint("Record not found\nHint: list it"),
            ("Record not found", Some("Hint: list it"))
        );
        assert_eq!(split_hint("plain"), ("plain", None));
    }
}
