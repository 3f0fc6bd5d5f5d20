use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use domain::services::{FixedJobHours, LoggingEventPublisher, SystemClock};
use persistence::PgDutyStore;
use tracing::info;

use duty_roster_worker::config::Config;
use duty_roster_worker::jobs::{
    EventDispatchJob, JobScheduler, PoolMetricsJob, SlotGenerationJob, SlotReconciliationJob,
};
use duty_roster_worker::logging::init_logging;
use duty_roster_worker::roster::DutyRoster;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config.logging);

    info!("Starting Duty Roster worker v{}", env!("CARGO_PKG_VERSION"));

    if config.metrics.enabled {
        let addr = config.metrics_addr()?;
        duty_roster_worker::metrics::init_metrics(addr)
            .context("Failed to install Prometheus exporter")?;
        info!(%addr, "Metrics endpoint listening");
    }

    let db_config: persistence::db::DatabaseConfig = (&config.database).into();
    let pool = persistence::db::create_pool(&db_config)
        .await
        .context("Failed to connect to database")?;
    info!("Database connection pool created");

    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    info!("Database migrations completed");

    // Hosts with a calendar consumer pass their own publisher instead.
    let roster = DutyRoster::new(
        Arc::new(PgDutyStore::new(pool.clone())),
        Arc::new(SystemClock),
        config.duty.clone(),
        Arc::new(LoggingEventPublisher),
        Arc::new(FixedJobHours::new()),
    );

    let mut scheduler = JobScheduler::new();
    scheduler.register(SlotGenerationJob::new(
        Arc::clone(&roster.expander),
        config.jobs.generation_horizon_days,
        config.jobs.generation_interval_minutes,
    ));
    scheduler.register(SlotReconciliationJob::new(
        Arc::clone(&roster.lifecycle),
        config.jobs.reconciliation_interval_minutes,
    ));
    scheduler.register(EventDispatchJob::new(
        Arc::clone(&roster.dispatcher),
        config.jobs.event_dispatch_batch_size,
        config.jobs.event_dispatch_interval_secs,
    ));
    scheduler.register(PoolMetricsJob::new(
        pool.clone(),
        config.jobs.pool_metrics_interval_secs,
    ));
    scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    scheduler.shutdown();
    scheduler
        .wait_for_shutdown(Duration::from_secs(config.jobs.shutdown_timeout_secs))
        .await;

    pool.close().await;
    info!("Duty Roster worker stopped");

    Ok(())
}
