//! Portal notifier CLI
//!
//! Local entry point: configuration checks, snapshot inspection, user
//! management and cycles driven by a recorded portal dump.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use portal_notifier::{
    error::Result,
    models::{Config, NewUser},
    pipeline::{
        CycleOutcome, RecoveryController, Scheduler, StoreResync, SyncCycle, register_user,
        unregister_user,
    },
    services::{
        Dispatcher, FixtureScraper, HttpSender, LogSender, NotificationService, RetryingNotifier,
    },
    snapshot::SnapshotStore,
    storage::Repositories,
};

/// Portal notifier - academic portal announcement sync
#[derive(Parser, Debug)]
#[command(
    name = "portal-notifier",
    version,
    about = "Syncs academic portal enrollments and announcements"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration file
    Validate,

    /// Load the snapshot from storage and show collection sizes
    Info,

    /// Find a registered user by phone number
    Lookup {
        #[arg(long)]
        phone: String,
    },

    /// Register a user whose portal account is synced every cycle
    ///
    /// The credential is checked against the portal dump before saving.
    Register {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        registration: String,
        #[arg(long)]
        credential: String,
        #[arg(long)]
        name: Option<String>,
    },

    /// Remove a user and their enrollments
    Unregister {
        #[arg(long)]
        registration: String,
    },

    /// Run a single cycle against a recorded portal dump
    Once {
        #[arg(long)]
        fixture: PathBuf,
    },

    /// Run cycles on the configured interval until Ctrl-C
    Run {
        #[arg(long)]
        fixture: PathBuf,
    },
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn build_notifier(config: &Config) -> Result<Arc<dyn NotificationService>> {
    Ok(match HttpSender::from_config(&config.notifier)? {
        Some(sender) => Arc::new(RetryingNotifier::from_config(sender, &config.notifier)),
        None => {
            log::warn!("No notifier endpoint configured; messages are only logged");
            Arc::new(RetryingNotifier::from_config(LogSender, &config.notifier))
        }
    })
}

async fn load_store(repos: &Repositories) -> Result<Arc<SnapshotStore>> {
    let store = Arc::new(SnapshotStore::new());
    store.full_sync(repos).await?;
    Ok(store)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let level = match (&loaded, cli.verbose) {
        (_, true) => "debug".to_string(),
        (Ok(config), false) => config.logging.level.clone(),
        (Err(_), false) => "info".to_string(),
    };
    init_logging(&level);

    let config = loaded.unwrap_or_else(|e| {
        log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            cli.config.display(),
            e
        );
        Config::default()
    });

    let repos = Repositories::local(&config.storage.data_dir);

    match cli.command {
        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }

        Command::Info => {
            let store = load_store(&repos).await?;
            let snapshot = store.snapshot();
            log::info!("Storage directory: {}", config.storage.data_dir.display());
            log::info!("Users: {}", snapshot.user_count());
            log::info!("Subjects: {}", snapshot.subject_count());
            log::info!("Enrollments: {}", snapshot.association_count());
            log::info!("Announcements: {}", snapshot.announcement_count());
        }

        Command::Lookup { phone } => {
            let store = load_store(&repos).await?;
            match store.lookup_user_by_phone(&phone) {
                Some(user) => {
                    log::info!(
                        "{} (registration {}, id {})",
                        user.display_name(),
                        user.registration,
                        user.id
                    );
                    for subject in store.snapshot().subjects_for_user(user.id) {
                        log::info!("  - {}", subject.name);
                    }
                }
                None => log::warn!("No user registered with phone {}", phone),
            }
        }

        Command::Register {
            fixture,
            phone,
            registration,
            credential,
            name,
        } => {
            let scraper = FixtureScraper::load(&fixture)?;
            let store = load_store(&repos).await?;
            let draft = NewUser {
                phone,
                registration,
                credential,
                name,
            };
            let user = register_user(&scraper, &store, &repos, draft).await?;
            log::info!("Registered {} with id {}", user.display_name(), user.id);
        }

        Command::Unregister { registration } => {
            let store = load_store(&repos).await?;
            let user = unregister_user(&store, &repos, &registration).await?;
            log::info!("Unregistered {} (id {})", user.display_name(), user.id);
        }

        Command::Once { fixture } => {
            config.validate()?;
            let scraper = FixtureScraper::load(&fixture)?;
            log::info!("Loaded portal dump with {} accounts", scraper.account_count());

            let store = load_store(&repos).await?;
            let dispatcher = Arc::new(Dispatcher::new(
                build_notifier(&config)?,
                config.notifier.max_in_flight,
            ));
            let cycle = SyncCycle::new(
                scraper,
                Arc::clone(&store),
                repos.clone(),
                Arc::clone(&dispatcher),
                &config,
            )?;
            let mut recovery = RecoveryController::from_config(
                Arc::new(StoreResync::new(store, repos)),
                &config.recovery,
            );

            let outcome = cycle.run(&mut recovery).await;
            dispatcher.drain().await;

            if let CycleOutcome::Completed(report) = outcome? {
                log::info!("Report: {}", serde_json::to_string(&report)?);
            }
        }

        Command::Run { fixture } => {
            config.validate()?;
            let scraper = FixtureScraper::load(&fixture)?;

            let store = Arc::new(SnapshotStore::new());
            let dispatcher = Arc::new(Dispatcher::new(
                build_notifier(&config)?,
                config.notifier.max_in_flight,
            ));
            let cycle = SyncCycle::new(
                scraper,
                Arc::clone(&store),
                repos.clone(),
                dispatcher,
                &config,
            )?;
            let recovery = RecoveryController::from_config(
                Arc::new(StoreResync::new(store, repos)),
                &config.recovery,
            );

            let scheduler = Scheduler::new(Arc::new(cycle), recovery, &config.scheduler);
            scheduler
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        log::error!("Failed to listen for Ctrl-C: {}", e);
                    }
                })
                .await;
        }
    }

    log::info!("Done!");

    Ok(())
}
