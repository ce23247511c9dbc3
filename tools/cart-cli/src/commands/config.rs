//! Configuration management commands.

use std::fs;

use anyhow::{bail, Result};
use dialoguer::Confirm;
use turbo_cart::config::CartConfig;

use super::{ConfigArgs, ConfigCommand};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { force, output } => init_config(force, output.as_deref(), ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("source", &path.display().to_string()),
        None => ctx.output.kv("source", "defaults"),
    }

    let config = &ctx.config;
    ctx.output.info("");
    ctx.output.info("[cart]");
    ctx.output.kv("currency", config.currency.code());
    ctx.output.kv("confirm_timeout_ms", &config.confirm_timeout_ms.to_string());
    ctx.output.kv("failure_policy", &format!("{:?}", config.failure_policy).to_lowercase());
    ctx.output.kv("max_quantity_per_item", &config.max_quantity_per_item.to_string());
    ctx.output.kv("open_on_add_min_width", &config.open_on_add_min_width.to_string());
    ctx.output.kv("cart_route", &config.cart_route);
    ctx.output.kv("notify_success", &config.notify_success.to_string());

    ctx.output.info("");
    ctx.output.info("[retry]");
    ctx.output.kv("max_attempts", &config.retry.max_attempts.to_string());
    ctx.output.kv("backoff_ms", &config.retry.backoff_ms.to_string());
    ctx.output.kv("exponential", &config.retry.exponential.to_string());
    ctx.output.kv("max_backoff_ms", &config.retry.max_backoff_ms.to_string());

    Ok(())
}

async fn init_config(force: bool, output: Option<&str>, ctx: &Context) -> Result<()> {
    let config_path = ctx.resolve_path(output.unwrap_or("cart.toml"));

    if config_path.exists() && !force {
        if ctx.output.is_json() {
            bail!(
                "Config file already exists: {}. Use --force to overwrite.",
                config_path.display()
            );
        }
        let overwrite = Confirm::new()
            .with_prompt(format!("Overwrite {}?", config_path.display()))
            .default(false)
            .interact()?;
        if !overwrite {
            ctx.output.warn("Left existing config untouched");
            return Ok(());
        }
    }

    let defaults = CartConfig::default();
    let content = if config_path.extension().is_some_and(|ext| ext == "json") {
        serde_json::to_string_pretty(&defaults)?
    } else {
        defaults.to_toml()?
    };
    fs::write(&config_path, content)?;

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let config = &ctx.config;
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    if let Err(e) = config.validate() {
        errors.push(e.to_string());
    }

    if config.confirm_timeout_ms > 30_000 {
        warnings.push(format!(
            "confirm_timeout_ms {} keeps the cart loading for a long time",
            config.confirm_timeout_ms
        ));
    }

    if config.retry.max_attempts > 0 && config.retry.max_backoff_ms < config.retry.backoff_ms {
        warnings.push("retry.max_backoff_ms is below retry.backoff_ms".to_string());
    }

    if config.open_on_add_min_width == 0 {
        warnings.push("open_on_add_min_width is 0; every add opens the cart".to_string());
    }

    // Print results
    if errors.is_empty() && warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for error in &errors {
        ctx.output.error(&format!("Error: {}", error));
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }

    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}
