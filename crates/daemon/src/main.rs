use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ldr_core::forecast::Forecaster;
use ldr_daemon::alerting::AlertMonitor;
use ldr_daemon::announcer::TracingPublisher;
use ldr_daemon::config_source::{ConfigSource, FileConfigSource};
use ldr_daemon::forecasting::ForecastScheduler;
use ldr_daemon::holiday_cache::HolidayCache;
use ldr_daemon::reconcile::ReconciliationLoop;
use ldr_daemon::settings::DaemonSettings;
use ldr_daemon::state;
use ldr_daemon::supervisor::SensorSupervisor;
use ldr_daemon::watcher::ConfigWatcher;
use ldr_db::{ForecastStore, MemoryStore, PgStore, SampleStore};
use ldr_events::{EventBus, EventJournal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ldr_daemon=info,ldr_db=info,ldr_events=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Settings and initial configuration ---
    let settings = DaemonSettings::from_env()?;
    let source = Arc::new(FileConfigSource::new(
        &settings.default_config_path,
        &settings.sensors_config_path,
    ));
    let initial = source
        .load()
        .await
        .context("Failed to load initial configuration")?;
    if initial.sensors.is_empty() {
        anyhow::bail!(
            "No sensors declared in {}",
            settings.sensors_config_path.display()
        );
    }
    tracing::info!(
        sensors = initial.sensors.len(),
        prediction_period_min = initial.defaults.database.prediction_period_min,
        "Loaded configuration"
    );

    // --- Stores ---
    let database_url = settings
        .database_url
        .clone()
        .or_else(|| initial.defaults.database.url.clone());
    let (samples, forecasts): (Arc<dyn SampleStore>, Arc<dyn ForecastStore>) = match database_url {
        Some(url) => {
            let pool = ldr_db::create_pool(&url)
                .await
                .context("Failed to connect to database")?;
            ldr_db::health_check(&pool)
                .await
                .context("Database health check failed")?;
            ldr_db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database ready");
            let store = Arc::new(PgStore::new(pool));
            let samples: Arc<dyn SampleStore> = store.clone();
            let forecasts: Arc<dyn ForecastStore> = store;
            (samples, forecasts)
        }
        None => {
            tracing::warn!("No database configured, readings and forecasts are kept in memory");
            let store = Arc::new(MemoryStore::new());
            let samples: Arc<dyn SampleStore> = store.clone();
            let forecasts: Arc<dyn ForecastStore> = store;
            (samples, forecasts)
        }
    };

    // --- Shared state ---
    let cancel = CancellationToken::new();
    let events = Arc::new(EventBus::default());
    let registry = state::shared_registry();
    let journal_handle = tokio::spawn(EventJournal::run(events.subscribe(), cancel.clone()));

    let supervisor = Arc::new(SensorSupervisor::new(
        Arc::clone(&registry),
        Arc::new(TracingPublisher),
        &cancel,
    ));
    let supervisor_handle = tokio::spawn(Arc::clone(&supervisor).run(events.subscribe()));

    // --- Reconciliation ---
    let reconciler = Arc::new(ReconciliationLoop::new(
        source.clone(),
        Arc::clone(&registry),
        Arc::clone(&events),
        settings.reconcile_interval,
    ));
    let report = reconciler
        .run_pass()
        .await
        .context("Initial reconciliation failed")?;
    tracing::info!(created = report.created.len(), "Sensors registered");

    let watcher = ConfigWatcher::new(
        source.paths(),
        settings.config_poll_interval,
        reconciler.trigger(),
    );

    // --- Forecasting ---
    let holidays = Arc::new(HolidayCache::new(initial.defaults.holiday_calendar()));
    holidays.refresh(Local::now().date_naive()).await?;
    let forecaster = Arc::new(Forecaster::new(initial.defaults.forecast_config())?);
    let scheduler = ForecastScheduler::new(
        Arc::clone(&registry),
        Arc::clone(&samples),
        Arc::clone(&forecasts),
        forecaster,
        Arc::clone(&holidays),
        Arc::clone(&events),
        settings.forecast_fit_timeout,
        initial.defaults.database.prediction_period_min,
    );
    let monitor = AlertMonitor::new(
        Arc::clone(&registry),
        Arc::clone(&samples),
        Arc::clone(&forecasts),
        Arc::clone(&events),
    );

    // --- Background tasks ---
    let handles: Vec<(&str, JoinHandle<()>)> = vec![
        ("reconciliation", {
            let (reconciler, cancel) = (Arc::clone(&reconciler), cancel.clone());
            tokio::spawn(async move { reconciler.run(cancel).await })
        }),
        ("config watcher", tokio::spawn(watcher.run(cancel.clone()))),
        ("holiday refresher", {
            let (holidays, cancel) = (Arc::clone(&holidays), cancel.clone());
            tokio::spawn(async move { holidays.run(cancel).await })
        }),
        ("forecast scheduler", {
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(cancel).await })
        }),
        ("alert monitor", tokio::spawn(monitor.run(cancel.clone()))),
    ];
    tracing::info!("LDR daemon running");

    shutdown_signal().await;

    // --- Shutdown ---
    cancel.cancel();
    supervisor.shutdown().await;
    for (name, handle) in handles {
        if tokio::time::timeout(settings.shutdown_timeout, handle).await.is_err() {
            tracing::warn!(task = name, "Task did not stop in time");
        }
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), supervisor_handle).await;

    drop(events);
    let _ = tokio::time::timeout(Duration::from_secs(5), journal_handle).await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
