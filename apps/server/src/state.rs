//! Shared application state

use crate::{
    config::Config,
    db::{InMemoryStore, PostgresStore, Repositories},
    services::{
        treatment::RegimenPricer, BlogService, DoctorService, MeetingService, PaymentService,
        ProtocolService, ScheduleService, TreatmentQueryService, TreatmentService,
        TreatmentStatsService,
    },
    Result,
};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Follow `database.url`: `memory://` selects the in-process store.
    FromConfig,
    /// Always use the in-process store (tests).
    InMemory,
}

#[derive(Debug, Clone)]
pub struct AppStateOptions {
    pub run_migrations: bool,
    pub storage: StorageKind,
}

impl Default for AppStateOptions {
    fn default() -> Self {
        Self {
            run_migrations: true,
            storage: StorageKind::FromConfig,
        }
    }
}

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repos: Repositories,
    pub treatment_service: Arc<TreatmentService>,
    pub treatment_query_service: Arc<TreatmentQueryService>,
    pub treatment_stats_service: Arc<TreatmentStatsService>,
    pub protocol_service: Arc<ProtocolService>,
    pub doctor_service: Arc<DoctorService>,
    pub schedule_service: Arc<ScheduleService>,
    pub meeting_service: Arc<MeetingService>,
    pub blog_service: Arc<BlogService>,
    pub payment_service: Arc<PaymentService>,
}

impl AppState {
    /// Initialize the application state
    pub async fn new(config: Config) -> Result<Self> {
        let options = AppStateOptions {
            run_migrations: config.database.run_migrations,
            ..AppStateOptions::default()
        };
        Self::new_with_options(config, options).await
    }

    pub async fn new_with_options(config: Config, options: AppStateOptions) -> Result<Self> {
        tracing::info!("Initializing application state...");

        let in_memory =
            options.storage == StorageKind::InMemory || config.database.is_in_memory();

        let repos = if in_memory {
            tracing::info!("Using the in-memory store; data is lost on shutdown");
            Repositories::in_memory(Arc::new(InMemoryStore::new()))
        } else {
            let db_pool = create_db_pool(&config).await?;
            if options.run_migrations {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&db_pool).await?;
            }
            Repositories::postgres(PostgresStore::new(db_pool))
        };

        Self::from_repositories(config, repos)
    }

    /// Wire services on top of already constructed repositories.
    pub fn from_repositories(config: Config, repos: Repositories) -> Result<Self> {
        let config = Arc::new(config);
        let pricer = RegimenPricer::new(&repos, config.treatment.default_duration_days);

        let state = Self {
            treatment_service: Arc::new(TreatmentService::new(&repos, pricer.clone())),
            treatment_query_service: Arc::new(TreatmentQueryService::new(
                &repos,
                pricer,
                config.pagination.clone(),
            )),
            treatment_stats_service: Arc::new(TreatmentStatsService::new(&repos)),
            protocol_service: Arc::new(ProtocolService::new(&repos)),
            doctor_service: Arc::new(DoctorService::new(&repos)),
            schedule_service: Arc::new(ScheduleService::new(&repos, config.scheduling.clone())),
            meeting_service: Arc::new(MeetingService::new(&repos, config.pagination.clone())),
            blog_service: Arc::new(BlogService::new(&repos, config.pagination.clone())),
            payment_service: Arc::new(PaymentService::new(&repos, config.payment.clone())?),
            repos,
            config,
        };

        tracing::info!(backend = state.repos.backend_name(), "Application state initialized");
        Ok(state)
    }
}

async fn create_db_pool(config: &Config) -> Result<PgPool> {
    tracing::info!("Creating database connection pool...");

    let statement_timeout = config.database.statement_timeout_seconds;
    let lock_timeout = config.database.lock_timeout_seconds;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .min_connections(config.database.pool_min_size)
        .max_connections(config.database.pool_max_size)
        .acquire_timeout(std::time::Duration::from_secs(
            config.database.pool_timeout_seconds,
        ))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                // Set statement timeout (max query execution time)
                sqlx::query(&format!("SET statement_timeout = '{}s'", statement_timeout))
                    .execute(&mut *conn)
                    .await?;

                // Set lock timeout (max lock wait time - fail fast)
                sqlx::query(&format!("SET lock_timeout = '{}s'", lock_timeout))
                    .execute(&mut *conn)
                    .await?;

                Ok(())
            })
        })
        .connect(&config.database.url)
        .await
        .map_err(crate::Error::Database)?;

    tracing::info!(
        "Database pool created (min: {}, max: {})",
        config.database.pool_min_size,
        config.database.pool_max_size
    );

    Ok(pool)
}
