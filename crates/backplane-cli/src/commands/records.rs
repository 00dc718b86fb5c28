use std::io::Write;

use serde_json::Value;

use backplane_core::dispatch::new_record_id;
use backplane_core::storage::{record_id, Record};

use crate::app::AppContext;
use crate::cli::{GetArgs, ListArgs, PutArgs, RecordKeyArgs, UpdateArgs};
use crate::errors::CliError;
use crate::helpers::parse_record;
use crate::output::{print_json, records_table};

fn not_found(table: &str, id: &str) -> CliError {
    CliError::not_found(
        format!("Record not found: {}/{}", table, id),
        format!("Hint: Run `backplane records list {}` to see ids.", table),
    )
}

pub fn handle_put(ctx: &AppContext, args: &PutArgs) -> anyhow::Result<()> {
    let record = parse_record(&args.data)?;
    let id = args
        .id
        .clone()
        .or_else(|| record_id(&record).map(str::to_string))
        .unwrap_or_else(new_record_id);

    let stored = ctx.require_storage()?.insert_item(&args.table, &id, record)?;
    if ctx.quiet() {
        println!("{}", id);
    } else {
        print_json(&Value::Object(stored))?;
    }
    Ok(())
}

pub fn handle_get(ctx: &AppContext, args: &GetArgs) -> anyhow::Result<()> {
    let storage = ctx.require_storage()?;
    let RecordKeyArgs { table, id } = &args.key;

    if args.binary {
        let bytes = storage
            .get_binary_item(table, id)?
            .ok_or_else(|| not_found(table, id))?;
        std::io::stdout().write_all(&bytes)?;
        return Ok(());
    }

    let record = storage.get_item(table, id)?.ok_or_else(|| not_found(table, id))?;
    print_json(&Value::Object(record))
}

pub fn handle_list(ctx: &AppContext, args: &ListArgs) -> anyhow::Result<()> {
    let storage = ctx.require_storage()?;
    let mut records: Vec<Record> = match (&args.prefix, &args.pattern) {
        (Some(prefix), _) => storage.search_by_key_part(&args.table, prefix, false)?,
        (None, Some(pattern)) => storage.search_by_key_part(&args.table, pattern, true)?,
        (None, None) => storage.get_all_items(&args.table)?,
    };
    records.sort_by(|a, b| record_id(a).cmp(&record_id(b)));

    if args.json {
        return print_json(&Value::Array(records.into_iter().map(Value::Object).collect()));
    }
    if records.is_empty() {
        if !ctx.quiet() {
            println!("No records in {}", args.table);
        }
        return Ok(());
    }
    println!("{}", records_table(&records));
    Ok(())
}

pub fn handle_update(ctx: &AppContext, args: &UpdateArgs) -> anyhow::Result<()> {
    let partial = parse_record(&args.data)?;
    let updated = ctx
        .require_storage()?
        .update_item(&args.table, &args.id, partial)?
        .ok_or_else(|| not_found(&args.table, &args.id))?;
    if !ctx.quiet() {
        print_json(&Value::Object(updated))?;
    }
    Ok(())
}

pub fn handle_delete(ctx: &AppContext, args: &RecordKeyArgs) -> anyhow::Result<()> {
    ctx.require_storage()?.delete_item(&args.table, &args.id)?;
    if !ctx.quiet() {
        println!("Deleted {}/{}", args.table, args.id);
    }
    Ok(())
}
