use std::time::Duration;

use backplane_core::queue::QueueListener;

use crate::app::AppContext;
use crate::cli::{ListenArgs, QueueNameArgs, ReceiveArgs, SendArgs};
use crate::errors::CliError;
use crate::helpers::parse_arg;
use crate::output::print_json;

pub fn handle_send(ctx: &AppContext, args: &SendArgs) -> anyhow::Result<()> {
    let queue = ctx.queue(args.queue.name.as_deref())?;
    queue.send_message(parse_arg(&args.body))?;
    if !ctx.quiet() {
        println!("Sent to {} queue", queue.name());
    }
    Ok(())
}

pub fn handle_receive(ctx: &AppContext, args: &ReceiveArgs) -> anyhow::Result<()> {
    let queue = ctx.queue(args.queue.name.as_deref())?;
    let message = queue.receive_message()?.ok_or_else(|| {
        CliError::not_found(
            "No message available",
            "Hint: Run `backplane queue send <body>` first.",
        )
    })?;
    if !args.keep {
        queue.delete_message(&message.handle)?;
    }
    print_json(&message.body)
}

pub fn handle_count(ctx: &AppContext, args: &QueueNameArgs) -> anyhow::Result<()> {
    let queue = ctx.queue(args.name.as_deref())?;
    println!("{}", queue.get_message_count()?);
    Ok(())
}

/// Print each message as one JSON line until the poll budget is spent.
pub fn handle_listen(ctx: &AppContext, args: &ListenArgs) -> anyhow::Result<()> {
    let queue = ctx.queue(args.queue.name.as_deref())?;
    let mut listener =
        QueueListener::new(queue).with_interval(Duration::from_millis(args.interval_ms));
    if let Some(max_polls) = args.max_polls {
        listener = listener.with_max_polls(max_polls);
    }

    let stats = listener.run(|message| {
        println!("{}", message.body);
        Ok(())
    })?;
    if !ctx.quiet() {
        eprintln!(
            "Handled {} message(s) in {} poll(s)",
            stats.handled, stats.polls
        );
    }
    Ok(())
}
