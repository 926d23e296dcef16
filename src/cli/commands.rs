//! CLI subcommands: serve, init, config, jobs, and config loading.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::gateway;
use crate::jobs::JobStore;

/// Load configuration from file or defaults
pub(crate) fn load_config(config_path: Option<&str>) -> Result<Config> {
    let config = if let Some(path) = config_path {
        tracing::info!("Loading configuration from custom path: {}", path);
        Config::load_from_path(path)?
    } else {
        tracing::debug!("Loading default configuration");
        Config::load()?
    };

    config.validate()?;

    Ok(config)
}

/// Start the gateway
pub(crate) async fn cmd_serve(
    mut config: Config,
    port: Option<u16>,
    bind: Option<String>,
) -> Result<()> {
    if let Some(port) = port {
        config.gateway.port = port;
    }
    if let Some(bind) = bind {
        config.gateway.bind = bind;
    }

    gateway::serve(&config).await
}

/// Initialize configuration file
pub(crate) fn cmd_init(force: bool) -> Result<()> {
    println!("Courier Relay configuration initialization\n");

    let config_path = Config::system_config_path()
        .context("Could not determine config directory")?;

    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at: {}\nUse --force to overwrite",
            config_path.display()
        );
    }

    let default_config = Config::default();
    default_config.save(&config_path)?;

    println!("Configuration initialized at: {}", config_path.display());
    println!("\nNext steps:");
    println!("   1. Set router.fallback_pool (or switch router.provisioning)");
    println!("   2. Point jobs.seed_file at your job list");
    println!("   3. Run 'courier-relay' to start the gateway");

    Ok(())
}

/// Show configuration
pub(crate) fn cmd_config(config: &Config) -> Result<()> {
    println!("Courier Relay configuration\n");

    println!("Gateway:   {}:{}", config.gateway.bind, config.gateway.port);
    println!("Log level: {}", config.logging.level);
    println!(
        "Provisioning: {:?} ({} fallback phone(s), {:?} selection)",
        config.router.provisioning,
        config.router.fallback_pool.len(),
        config.router.selection,
    );
    println!("Transport: {:?}", config.transport.mode);
    match config.jobs.seed_file {
        Some(ref path) => println!("Seed file: {}", path.display()),
        None => println!("Seed file: [NOT SET]"),
    }

    Ok(())
}

/// List jobs from the configured seed file
pub(crate) async fn cmd_jobs(config: &Config) -> Result<()> {
    let Some(ref seed_file) = config.jobs.seed_file else {
        anyhow::bail!("No seed file configured (jobs.seed_file)");
    };

    let store = JobStore::new();
    let count = store
        .load_seed_file(seed_file)
        .await
        .with_context(|| format!("Failed to load seed file: {:?}", seed_file))?;

    println!("{} job(s) in {}\n", count, seed_file.display());
    for job in store.list().await {
        println!(
            "  {}  [{}]  {}",
            job.id,
            job.status,
            job.phone.as_deref().unwrap_or("-"),
        );
    }

    Ok(())
}
