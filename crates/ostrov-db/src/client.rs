//! Database client and connection management

use crate::{DbError, DbResult, Row, Value};
use ostrov_config::{Config, ConfigProvider};
use sqlx::encode::IsNull;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{
    PgArgumentBuffer, PgArguments, PgConnectOptions, PgPool, PgPoolOptions, PgTypeInfo,
};
use sqlx::query::Query;
use sqlx::Postgres;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Query surface of the data-access layer.
///
/// Each query call runs on its own pooled connection inside its own
/// transaction, committed before the call returns. Nothing is shared
/// between calls.
#[async_trait::async_trait]
pub trait DatabaseAccess: Send + Sync {
    /// Open the connection pool.
    async fn connect(&mut self) -> DbResult<()>;

    /// Release every pooled connection. Closing twice is a no-op.
    async fn close(&mut self) -> DbResult<()>;

    /// First row of the result set, or [`DbError::RowNotFound`] when it is empty.
    async fn fetch_one(&self, query: &str) -> DbResult<Row>;

    /// All rows of the result set; empty is not an error.
    async fn fetch_many(&self, query: &str) -> DbResult<Vec<Row>>;

    /// Execute a statement with `$1..$n` bound to `args`.
    async fn insert(&self, query: &str, args: &[Value]) -> DbResult<()>;
}

/// Lifecycle of the pool held by a [`Database`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// `connect()` has not been called yet.
    Disconnected,
    Open,
    Closed,
}

/// PostgreSQL-backed [`DatabaseAccess`].
pub struct Database<C = Config> {
    config: C,
    max_connections: u32,
    acquire_timeout: Duration,
    pool: Option<PgPool>,
}

impl<C: ConfigProvider> Database<C> {
    pub fn new(config: C) -> Self {
        Self {
            config,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            pool: None,
        }
    }

    /// Upper bound on live connections; callers beyond it wait for a release.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn state(&self) -> PoolState {
        match &self.pool {
            None => PoolState::Disconnected,
            Some(pool) if pool.is_closed() => PoolState::Closed,
            Some(_) => PoolState::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == PoolState::Open
    }

    /// The live pool, for statements outside the query surface (DDL, batch work).
    pub fn pool(&self) -> DbResult<&PgPool> {
        self.pool
            .as_ref()
            .filter(|pool| !pool.is_closed())
            .ok_or(DbError::NotConnected)
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> DbResult<()> {
        self.fetch_one("SELECT 1 AS ok").await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl<C: ConfigProvider> DatabaseAccess for Database<C> {
    async fn connect(&mut self) -> DbResult<()> {
        let opts = connect_options(&self.config);
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect_with(opts)
            .await?;

        if let Some(previous) = self.pool.replace(pool) {
            previous.close().await;
        }
        debug!(
            host = self.config.db_host(),
            port = self.config.db_port(),
            database = self.config.db_name(),
            "Connection pool opened"
        );
        Ok(())
    }

    async fn close(&mut self) -> DbResult<()> {
        if let Some(pool) = &self.pool {
            if !pool.is_closed() {
                pool.close().await;
                debug!("Connection pool closed");
            }
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_one(&self, query: &str) -> DbResult<Row> {
        let mut tx = self.pool()?.begin().await?;
        let row = sqlx::query(query)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DbError::from_statement)?;

        let row = match row {
            Some(row) => Row::try_from(&row)?,
            None => return Err(DbError::RowNotFound),
        };
        tx.commit().await?;
        Ok(row)
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_many(&self, query: &str) -> DbResult<Vec<Row>> {
        let mut tx = self.pool()?.begin().await?;
        let rows = sqlx::query(query)
            .fetch_all(&mut *tx)
            .await
            .map_err(DbError::from_statement)?;

        let rows = rows.iter().map(Row::try_from).collect::<DbResult<Vec<_>>>()?;
        tx.commit().await?;

        debug!("Fetched {} rows", rows.len());
        Ok(rows)
    }

    #[instrument(level = "debug", skip(self, args), fields(args = args.len()))]
    async fn insert(&self, query: &str, args: &[Value]) -> DbResult<()> {
        let mut tx = self.pool()?.begin().await?;
        args.iter()
            .fold(sqlx::query(query), bind_value)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from_statement)?;
        tx.commit().await?;
        Ok(())
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(UntypedNull),
        Value::Bool(v) => query.bind(*v),
        Value::Integer(v) => query.bind(*v),
        Value::Timestamp(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.clone()),
    }
}

/// NULL parameter with OID 0, so the server infers the column type.
struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl sqlx::Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> IsNull {
        IsNull::Yes
    }
}

/// PostgreSQL connection options for the configured target.
pub fn connect_options(config: &impl ConfigProvider) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(config.db_host())
        .port(config.db_port())
        .database(config.db_name())
        .username(config.db_user())
        .password(config.db_password())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::new(8080, "db.example.com", 5433, "ostrov", "admin", "secret")
    }

    #[test]
    fn connect_options_use_config_values() {
        let opts = connect_options(&config());
        assert_eq!(opts.get_host(), "db.example.com");
        assert_eq!(opts.get_port(), 5433);
        assert_eq!(opts.get_database(), Some("ostrov"));
        assert_eq!(opts.get_username(), "admin");
    }

    #[test]
    fn new_database_is_disconnected() {
        let db = Database::new(config()).max_connections(2);
        assert_eq!(db.state(), PoolState::Disconnected);
        assert!(!db.is_open());
        assert_eq!(db.config(), &config());
        assert!(matches!(db.pool(), Err(DbError::NotConnected)));
    }

    #[tokio::test]
    async fn queries_fail_fast_before_connect() {
        let db = Database::new(config());
        assert!(matches!(
            db.fetch_one("SELECT 1").await,
            Err(DbError::NotConnected)
        ));
        assert!(matches!(
            db.fetch_many("SELECT 1").await,
            Err(DbError::NotConnected)
        ));
        assert!(matches!(
            db.insert("INSERT INTO t VALUES ($1)", &[Value::from(1)]).await,
            Err(DbError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn close_without_connect_is_ok() {
        let mut db = Database::new(config());
        db.close().await.unwrap();
        db.close().await.unwrap();
        assert_eq!(db.state(), PoolState::Disconnected);
    }

    #[tokio::test]
    async fn connect_to_unreachable_host_fails() {
        let unreachable = Config::new(8080, "127.0.0.1", 1, "ostrov", "nobody", "nothing");
        let mut db = Database::new(unreachable).acquire_timeout(Duration::from_secs(2));
        let err = db.connect().await.unwrap_err();
        assert!(matches!(err, DbError::Database(_)));
        assert_eq!(db.state(), PoolState::Disconnected);
    }
}
