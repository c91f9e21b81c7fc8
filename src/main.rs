use anyhow::{Context, Result};
use bridge_desktop::{AdbConfig, AdbDeviceBridge};
use clap::Parser;
use core_library::MusicBeeCatalogSource;
use core_metadata::LoftyTagAccess;
use core_runtime::config::{load_toml, RuntimeConfig, SyncRules};
use core_runtime::logging::init_logging;
use core_sync::{PathTranslator, SqliteSyncStateStore, StagingOptions, SyncConfig, SyncOrchestrator};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[clap(about = "Mirror a MusicBee library onto a portable player over ADB")]
struct CliArgs {
    /// Path to the configuration file.
    #[clap(long, default_value = "/app/config/config.toml")]
    pub config: PathBuf,

    /// Path to the optional sync rules file.
    #[clap(long, default_value = "/app/config/sync-rules.toml")]
    pub sync_rules: PathBuf,

    /// Show what would be synced without connecting to the device.
    #[clap(long)]
    pub dry_run: bool,

    /// Log at debug level.
    #[clap(short, long)]
    pub verbose: bool,
}

/// The whole configuration file: runtime sections plus `[sync]`.
#[derive(Debug, Deserialize)]
struct AppConfig {
    #[serde(flatten)]
    runtime: RuntimeConfig,
    #[serde(default)]
    sync: SyncConfig,
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let config: AppConfig = load_toml(&args.config)?;
    config.runtime.validate()?;
    config.sync.validate()?;
    Ok(config)
}

/// Overlay playlist mappings from the sync rules file, if there is one.
fn apply_sync_rules(args: &CliArgs, config: &mut SyncConfig) {
    match SyncRules::load(&args.sync_rules) {
        Ok(Some(rules)) => {
            info!("Loaded sync rules from {}", args.sync_rules.display());
            rules.apply_to(&mut config.playlist_mappings);
        }
        Ok(None) => warn!(
            "No sync rules at {}, using configured mappings",
            args.sync_rules.display()
        ),
        Err(e) => warn!("Ignoring sync rules: {}", e),
    }
}

fn build_orchestrator(config: &AppConfig) -> SyncOrchestrator {
    let runtime = &config.runtime;

    let mut source = MusicBeeCatalogSource::new(
        &runtime.library.library_xml,
        &runtime.library.library_root,
    );
    if let Some(dir) = &runtime.library.playlists_dir {
        source = source.with_playlists_dir(dir);
    }

    let bridge = AdbDeviceBridge::new(
        AdbConfig::new(runtime.device.ip_address.clone(), runtime.device.port)
            .with_adb_path(&runtime.device.adb_path)
            .with_connect_timeout(runtime.timeouts.connect())
            .with_probe_timeout(runtime.timeouts.shell()),
    );

    SyncOrchestrator::new(
        config.sync.clone(),
        PathTranslator::new(&runtime.library.library_root, &runtime.device.music_root),
        Arc::new(source),
        Arc::new(bridge),
        Arc::new(LoftyTagAccess::new(runtime.metadata.artwork_size)),
        Arc::new(SqliteSyncStateStore::new(&runtime.database.path)),
    )
    .with_timeouts(runtime.timeouts.push(), runtime.timeouts.playlist_push())
    .with_staging(StagingOptions {
        preserve_tags: runtime.metadata.preserve_tags,
        embed_artwork: runtime.metadata.embed_artwork,
    })
}

async fn run(args: CliArgs) -> Result<ExitCode> {
    let mut config = load_config(&args)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    let mut logging = config.runtime.logging.to_logging_config(args.verbose);
    if let Ok(filter) = std::env::var("RUST_LOG") {
        logging = logging.with_filter(filter);
    }
    init_logging(logging)?;

    info!("Loaded configuration from {}", args.config.display());
    apply_sync_rules(&args, &mut config.sync);
    let orchestrator = build_orchestrator(&config);

    if args.dry_run {
        let plan = orchestrator.plan().await?;
        println!("Dry run: {}", plan.summary());
        for name in &plan.playlists {
            println!("  playlist: {}", name);
        }
        return Ok(ExitCode::SUCCESS);
    }

    tokio::select! {
        report = orchestrator.run() => {
            println!("{}", report.stats.summary());
            if let Some(e) = &report.error {
                error!("Sync failed: {}", e);
            }
            Ok(if report.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, progress so far is saved");
            Ok(ExitCode::from(130))
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
