use crate::app::{resolve_config_path, AppContext};
use crate::cli::InitArgs;
use crate::config::{default_data_dir, write_config, BackplaneConfig};
use crate::errors::CliError;
use crate::helpers::generate_secret;

/// Write a starter config with local backends and a generated JWT secret.
pub fn handle_init(ctx: &AppContext, args: &InitArgs) -> anyhow::Result<()> {
    let path = resolve_config_path(ctx.cli())?;
    if path.exists() && !args.force {
        return Err(CliError::invalid_input(format!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        ))
        .into());
    }

    let base_dir = match &args.base_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };
    let config = BackplaneConfig::new(args.database_type.clone(), base_dir, generate_secret()?);
    backplane_core::get_database(&config.backplane)?;

    write_config(&path, &config)?;
    tracing::info!(path = %path.display(), "config written");
    if !ctx.quiet() {
        println!("Wrote config to {}", path.display());
        println!(
            "Storage: {} at {}",
            config.backplane.database_type,
            config.backplane.base_dir.display()
        );
    }
    Ok(())
}
