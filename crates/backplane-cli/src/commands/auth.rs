use serde_json::{json, Value};

use crate::app::AppContext;
use crate::cli::{CredentialsArgs, TokenArgs};
use crate::errors::CliError;
use crate::helpers::read_password;
use crate::output::print_json;

pub fn handle_register(ctx: &AppContext, args: &CredentialsArgs) -> anyhow::Result<()> {
    let password = read_password(args.password_stdin, args.no_input, true)?;
    let user = ctx.auth()?.register_user(&args.username, &password)?;
    if !ctx.quiet() {
        print_json(&Value::Object(user))?;
    }
    Ok(())
}

pub fn handle_login(ctx: &AppContext, args: &CredentialsArgs) -> anyhow::Result<()> {
    let password = read_password(args.password_stdin, args.no_input, false)?;
    let token = ctx
        .auth()?
        .authenticate(&args.username, &password)?
        .ok_or_else(|| CliError::auth_failed("Invalid username or password"))?;
    println!("{}", token);
    Ok(())
}

pub fn handle_whoami(ctx: &AppContext, args: &TokenArgs) -> anyhow::Result<()> {
    let identity = ctx.identify(&args.token)?;
    print_json(&json!(identity))
}

pub fn handle_refresh(ctx: &AppContext, args: &TokenArgs) -> anyhow::Result<()> {
    let token = ctx.auth()?.refresh_token(&args.token)?.ok_or_else(|| {
        CliError::auth_failed_with_hint(
            "Token cannot be refreshed",
            "Hint: Run `backplane auth login <username>` for a new one.",
        )
    })?;
    println!("{}", token);
    Ok(())
}

pub fn handle_logout(ctx: &AppContext, args: &TokenArgs) -> anyhow::Result<()> {
    if !ctx.auth()?.logout(&args.token)? {
        return Err(CliError::auth_failed("Token is not active").into());
    }
    if !ctx.quiet() {
        println!("Logged out");
    }
    Ok(())
}
