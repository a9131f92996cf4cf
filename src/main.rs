//! clientsync CLI: drives the notification hub, theme cache and locale
//! reconciler against a live backend.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use clientsync::cache::{FileStore, KvStore};
use clientsync::notifications::LogNotifier;
use clientsync::preference::{LocationContext, Navigator, PreferenceRecord};
use clientsync::theme::{ThemeRecord, THEME_SLOT};
use clientsync::{
    logging, Clock, Config, HttpApi, HubSettings, LocaleRouting, NotificationHub,
    PreferenceReconciler, ReconcileOutcome, SessionStore, SystemClock, ThemeLoader,
    TtlVersionedCache,
};

#[derive(Parser)]
#[command(name = "clientsync", version, about = "Resilient client-side sync for notifications, theme and locale")]
struct Cli {
    /// Config file (default: platform config dir/clientsync/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bearer token for the backend API
    #[arg(long, global = true, env = "CLIENTSYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Id of the signed-in user
    #[arg(long, global = true, env = "CLIENTSYNC_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Keep the notification list in sync until Ctrl-C
    Watch {
        /// Subscribe to the push stream even if the config disables it
        #[arg(long)]
        push: bool,
    },
    /// Mark one notification as read
    MarkRead { id: String },
    /// Mark every notification as read
    MarkAllRead,
    /// Delete a notification
    Remove { id: String },
    /// Print a theme record, served from cache when valid
    Theme {
        key: String,
        /// Drop the cached record first
        #[arg(long)]
        refresh: bool,
    },
    /// Print where the stored locale preference would redirect
    Reconcile {
        #[arg(long)]
        locale: String,
        #[arg(long)]
        path: String,
    },
}

/// Prints the redirect target instead of navigating.
struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn navigate(&self, path: &str) {
        println!("{path}");
    }
}

struct App {
    config: Config,
    session: SessionStore,
    api: Arc<HttpApi>,
    clock: Arc<dyn Clock>,
}

impl App {
    fn hub(&self) -> NotificationHub {
        NotificationHub::new(
            self.api.clone(),
            HubSettings::from(&self.config.notifications),
            self.config.retry.policy(),
            Arc::clone(&self.clock),
            Arc::new(LogNotifier),
        )
    }

    fn store(&self) -> Arc<dyn KvStore> {
        let path = self
            .config
            .cache
            .path
            .clone()
            .unwrap_or_else(FileStore::default_path);
        Arc::new(FileStore::new(path))
    }

    fn cache<T>(&self, slot: &str) -> TtlVersionedCache<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        TtlVersionedCache::new(
            self.store(),
            slot,
            self.config.cache.schema_version.clone(),
            self.config.cache.ttl(),
            Arc::clone(&self.clock),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_target = logging::init_tracing();
    tracing::debug!(output = ?log_target, "Logging initialised");

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    let session = SessionStore::new();
    match (cli.user, cli.token) {
        (Some(user), Some(token)) => session.sign_in(user, token),
        (None, Some(token)) => session.set_token(token),
        _ => {}
    }

    let api = Arc::new(HttpApi::new(&config.api, session.clone()).context("Failed to build API client")?);
    let app = App {
        config,
        session,
        api,
        clock: Arc::new(SystemClock),
    };

    match cli.command {
        Command::Watch { push } => watch(&app, push).await,
        Command::MarkRead { id } => {
            app.hub().mark_read(&id).await.context("Mark read failed")?;
            println!("Marked {id} as read");
            Ok(())
        }
        Command::MarkAllRead => {
            let hub = app.hub();
            // Load first so the bulk mark has something to apply to locally.
            hub.refresh().await.context("Fetching notifications failed")?;
            let unread = hub.unread_count();
            hub.mark_all_read().await.context("Mark all read failed")?;
            println!("Marked {unread} notifications as read");
            Ok(())
        }
        Command::Remove { id } => {
            app.hub().remove(&id).await.context("Delete failed")?;
            println!("Deleted {id}");
            Ok(())
        }
        Command::Theme { key, refresh } => {
            let loader = ThemeLoader::new(
                app.api.clone(),
                app.cache::<ThemeRecord>(THEME_SLOT),
                app.config.retry.policy(),
            );
            if refresh {
                loader.invalidate();
            }
            let theme = loader.load(&key).await.context("Theme fetch failed")?;
            println!("{}", serde_json::to_string_pretty(&theme)?);
            Ok(())
        }
        Command::Reconcile { locale, path } => {
            let reconciler = PreferenceReconciler::new(
                app.session.clone(),
                app.api.clone(),
                app.config.retry.policy(),
                Arc::new(PrintNavigator),
                LocaleRouting::from(&app.config.locale),
            )
            .with_cache(app.cache::<PreferenceRecord>("preferences"));

            let outcome = reconciler.reconcile(&LocationContext::new(locale, path)).await;
            if !matches!(outcome, ReconcileOutcome::Redirected { .. }) {
                println!("No redirect: {outcome:?}");
            }
            Ok(())
        }
    }
}

async fn watch(app: &App, force_push: bool) -> Result<()> {
    let mut hub = app.hub();
    if force_push || app.config.notifications.push_enabled {
        hub = hub.with_push(app.api.clone());
    }
    hub.start();

    let mut updates = hub.subscribe();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut last_unread = None;
    let mut last_error = None;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let (unread, total, mode, error) = {
                    let state = updates.borrow_and_update();
                    (state.unread_count(), state.items.len(), state.channel_mode, state.error.clone())
                };
                if error != last_error {
                    if let Some(error) = &error {
                        eprintln!("Sync error: {error}");
                    }
                    last_error = error;
                }
                if last_unread != Some(unread) {
                    tracing::info!(unread, total, mode = ?mode, "Unread count changed");
                    println!("{unread} unread of {total}");
                    last_unread = Some(unread);
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Received Ctrl-C, shutting down");
                break;
            }
        }
    }

    hub.dispose();
    Ok(())
}
