use crate::config::AppConfig;
use crate::errors::ServiceError;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend};
use std::time::Duration;
use tracing::{debug, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };
    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(true);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await?;

    info!("Database connection pool established successfully");
    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    debug!("Checking database connection");
    pool.ping().await?;
    Ok(())
}

/// Creates the schema if it does not exist yet.
///
/// DDL differs per backend: Postgres gets native uuid/timestamptz/jsonb
/// columns, SQLite stores uuids as blobs and timestamps as text, matching
/// how sqlx encodes those types there.
pub async fn init_schema(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Initializing database schema");

    let statements: &[&str] = match pool.get_database_backend() {
        DbBackend::Postgres => POSTGRES_SCHEMA,
        _ => SQLITE_SCHEMA,
    };
    for stmt in statements {
        pool.execute_unprepared(stmt).await?;
    }

    info!("Database schema initialized");
    Ok(())
}

const POSTGRES_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS locations (
        id uuid PRIMARY KEY,
        store_number text NOT NULL UNIQUE,
        city text NOT NULL,
        state text NOT NULL,
        created_at timestamptz NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS technicians (
        id uuid PRIMARY KEY,
        name text NOT NULL,
        email text,
        location_id uuid NOT NULL REFERENCES locations(id),
        pin text NOT NULL,
        is_active boolean NOT NULL DEFAULT true,
        created_at timestamptz NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS refurb_requests (
        id uuid PRIMARY KEY,
        request_code text NOT NULL UNIQUE,
        location_id uuid NOT NULL REFERENCES locations(id),
        tech_id uuid NOT NULL REFERENCES technicians(id),
        category text,
        instrument_type text NOT NULL,
        brand text,
        quantity_requested integer NOT NULL,
        quantity_fulfilled integer,
        priority text,
        status text NOT NULL,
        notes text,
        fulfillment_notes text,
        fulfilled_by text,
        shipped_at timestamptz,
        expected_delivery date,
        started_at timestamptz,
        completed_at timestamptz,
        picked_up_at timestamptz,
        fulfilled_at timestamptz,
        created_at timestamptz NOT NULL,
        updated_at timestamptz NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_refurb_requests_status
        ON refurb_requests(status)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_refurb_requests_location
        ON refurb_requests(location_id)"#,
    r#"CREATE TABLE IF NOT EXISTS daily_completions (
        id uuid PRIMARY KEY,
        location_id uuid NOT NULL REFERENCES locations(id),
        tech_id uuid NOT NULL REFERENCES technicians(id),
        category text NOT NULL,
        instrument_type text NOT NULL,
        brand text NOT NULL,
        quantity_completed integer NOT NULL,
        yellow_armband_applied boolean NOT NULL,
        qc_card_signed boolean NOT NULL,
        notes text,
        completion_date date NOT NULL,
        created_at timestamptz NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_daily_completions_date
        ON daily_completions(completion_date)"#,
    r#"CREATE TABLE IF NOT EXISTS activity_log (
        id uuid PRIMARY KEY,
        request_id uuid NOT NULL REFERENCES refurb_requests(id),
        action text NOT NULL,
        details jsonb NOT NULL,
        performed_by text NOT NULL,
        created_at timestamptz NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_activity_log_request
        ON activity_log(request_id)"#,
];

const SQLITE_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS locations (
        id blob PRIMARY KEY,
        store_number text NOT NULL UNIQUE,
        city text NOT NULL,
        state text NOT NULL,
        created_at text NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS technicians (
        id blob PRIMARY KEY,
        name text NOT NULL,
        email text,
        location_id blob NOT NULL REFERENCES locations(id),
        pin text NOT NULL,
        is_active integer NOT NULL DEFAULT 1,
        created_at text NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS refurb_requests (
        id blob PRIMARY KEY,
        request_code text NOT NULL UNIQUE,
        location_id blob NOT NULL REFERENCES locations(id),
        tech_id blob NOT NULL REFERENCES technicians(id),
        category text,
        instrument_type text NOT NULL,
        brand text,
        quantity_requested integer NOT NULL,
        quantity_fulfilled integer,
        priority text,
        status text NOT NULL,
        notes text,
        fulfillment_notes text,
        fulfilled_by text,
        shipped_at text,
        expected_delivery text,
        started_at text,
        completed_at text,
        picked_up_at text,
        fulfilled_at text,
        created_at text NOT NULL,
        updated_at text NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_refurb_requests_status
        ON refurb_requests(status)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_refurb_requests_location
        ON refurb_requests(location_id)"#,
    r#"CREATE TABLE IF NOT EXISTS daily_completions (
        id blob PRIMARY KEY,
        location_id blob NOT NULL REFERENCES locations(id),
        tech_id blob NOT NULL REFERENCES technicians(id),
        category text NOT NULL,
        instrument_type text NOT NULL,
        brand text NOT NULL,
        quantity_completed integer NOT NULL,
        yellow_armband_applied integer NOT NULL,
        qc_card_signed integer NOT NULL,
        notes text,
        completion_date text NOT NULL,
        created_at text NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_daily_completions_date
        ON daily_completions(completion_date)"#,
    r#"CREATE TABLE IF NOT EXISTS activity_log (
        id blob PRIMARY KEY,
        request_id blob NOT NULL REFERENCES refurb_requests(id),
        action text NOT NULL,
        details text NOT NULL,
        performed_by text NOT NULL,
        created_at text NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_activity_log_request
        ON activity_log(request_id)"#,
];
