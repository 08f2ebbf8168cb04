use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use vigia_alert::engine::CheckEngine;
use vigia_common::types::{AlertConfig, AlertKind};
use vigia_notify::channels::email::EmailChannel;
use vigia_notify::channels::inapp::InAppChannel;
use vigia_notify::channels::push::PushChannel;
use vigia_notify::dispatch::DispatchOrchestrator;
use vigia_notify::NotificationChannel;
use vigia_storage::Store;

use vigia_server::adapters::{StoreDirectory, StoreFeed, StoreGc};
use vigia_server::app;
use vigia_server::config::{AlertConfigSeedFile, ServerConfig};
use vigia_server::rate_limit::{FixedWindowRateLimiter, NoopRateLimiter, RateLimitStore};
use vigia_server::scheduler::{AlertCheckScheduler, AlertPipeline};
use vigia_server::state::AppState;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  vigia-server [config.toml]                                Start the server");
    eprintln!("  vigia-server init-alert-configs <config.toml> [seed.json] Seed alert configurations (built-in defaults when seed omitted)");
    eprintln!("  vigia-server init-admin <config.toml> <username> <password> [email] Create an administrator account");
}

#[tokio::main]
async fn main() -> Result<()> {
    vigia_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vigia=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-alert-configs") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-alert-configs requires a <config.toml> argument")
            })?;
            run_init_alert_configs(config_path, args.get(3).map(String::as_str)).await
        }
        Some("init-admin") => {
            let (config_path, username, password) =
                match (args.get(2), args.get(3), args.get(4)) {
                    (Some(c), Some(u), Some(p)) => (c, u, p),
                    _ => {
                        print_usage();
                        anyhow::bail!(
                            "init-admin requires <config.toml> <username> <password> arguments"
                        );
                    }
                };
            run_init_admin(config_path, username, password, args.get(5).map(String::as_str))
                .await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

/// Seed alert configurations from a JSON file, or the built-in defaults.
/// Existing rows are left untouched so operator edits survive re-runs.
async fn run_init_alert_configs(config_path: &str, seed_path: Option<&str>) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = Store::new(&config.database.url).await?;

    let seed = match seed_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read seed file '{path}': {e}"))?;
            serde_json::from_str::<AlertConfigSeedFile>(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{path}': {e}"))?
        }
        None => AlertConfigSeedFile::defaults(),
    };

    let mut created = 0u32;
    let mut skipped = 0u32;

    for entry in &seed.configs {
        let kind: AlertKind = entry
            .alert_type
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        if store.get_alert_config(kind).await?.is_some() {
            tracing::warn!(alert_type = kind.as_str(), "Configuration exists, skipping");
            skipped += 1;
            continue;
        }

        let email_template_id = match &entry.email_template {
            Some(name) => {
                let template = store.get_template_by_name(name).await?.ok_or_else(|| {
                    anyhow::anyhow!("seed references unknown template '{name}'")
                })?;
                Some(template.id)
            }
            None => None,
        };

        store
            .upsert_alert_config(&AlertConfig {
                alert_type: kind,
                enabled: entry.enabled,
                notify_admin: entry.notify_admin,
                notify_coordinator: entry.notify_coordinator,
                auto_send_email: entry.auto_send_email,
                threshold_value: entry.threshold_value,
                email_template_id,
            })
            .await?;
        tracing::info!(alert_type = kind.as_str(), "Configuration created");
        created += 1;
    }

    tracing::info!(created, skipped, "Alert configuration seeding finished");
    Ok(())
}

async fn run_init_admin(
    config_path: &str,
    username: &str,
    password: &str,
    email: Option<&str>,
) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = Store::new(&config.database.url).await?;

    if store.get_user_by_username(username).await?.is_some() {
        anyhow::bail!("user '{username}' already exists");
    }

    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
    let user = store
        .create_user(username, &password_hash, email, username, "admin", None)
        .await?;
    tracing::info!(user_id = %user.id, username, "Administrator account created");
    Ok(())
}

fn build_channels(
    config: &ServerConfig,
    store: &Arc<Store>,
) -> Result<Vec<Arc<dyn NotificationChannel>>> {
    let mut channels: Vec<Arc<dyn NotificationChannel>> =
        vec![Arc::new(InAppChannel::new(Arc::new(StoreFeed(store.clone()))))];

    if config.email.enabled {
        let email = EmailChannel::new(
            &config.email.smtp_host,
            config.email.smtp_port,
            config.email.smtp_username.as_deref(),
            config.email.smtp_password.as_deref(),
            &config.email.from,
            config.email.timeout_secs,
        )?;
        channels.push(Arc::new(email));
        tracing::info!(host = %config.email.smtp_host, "Email channel enabled");
    }

    if config.push.enabled {
        if config.push.vapid_private_key.is_none() {
            tracing::warn!("push enabled without a VAPID key; most push services will reject unsigned sends");
        }
        let push = PushChannel::new(
            Arc::new(StoreGc(store.clone())),
            config.push.vapid_private_key.clone(),
            config.push.vapid_subject.clone(),
            config.push.timeout_secs,
        )?;
        channels.push(Arc::new(push));
        tracing::info!("Push channel enabled");
    }

    Ok(channels)
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = Arc::new(Store::new(&config.database.url).await?);

    let channels = build_channels(&config, &store)?;
    let orchestrator = Arc::new(DispatchOrchestrator::new(
        Arc::new(StoreDirectory(store.clone())),
        channels,
        config.alert_check.dispatch_in_flight,
    ));
    let engine = Arc::new(CheckEngine::with_default_checks());
    let pipeline = Arc::new(AlertPipeline::new(
        store.clone(),
        engine,
        orchestrator.clone(),
        config.alert_check.max_concurrent,
    ));

    if config.trigger.token.is_empty() {
        tracing::warn!("trigger.token is empty; the /v1/alerts/run endpoint is disabled");
    }

    let rate_limiter: Arc<dyn RateLimitStore> = if config.trigger.rate_limit_enabled {
        Arc::new(FixedWindowRateLimiter::per_hour(
            config.trigger.rate_limit_per_hour,
        ))
    } else {
        Arc::new(NoopRateLimiter)
    };

    if config.alert_check.enabled {
        let scheduler = AlertCheckScheduler::new(pipeline.clone(), config.alert_check.interval_secs);
        tokio::spawn(async move {
            scheduler.run().await;
        });
    }

    let state = AppState {
        store,
        pipeline,
        orchestrator,
        rate_limiter,
        jwt_secret: Arc::new(config.auth.jwt_secret.clone()),
        token_expire_secs: config.auth.token_expire_secs,
        trigger_token: Arc::new(config.trigger.token.clone()),
        start_time: chrono::Utc::now(),
        config: Arc::new(config.clone()),
    };

    let app = app::build_http_app(state);
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install ctrl-c handler");
    }
    tracing::info!("Shutdown signal received");
}
