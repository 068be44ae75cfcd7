use actix_web::web;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use failsafe::backoff::EqualJittered;
use failsafe::failure_policy::{ConsecutiveFailures, OrElse, SuccessRateOverTimeWindow};
use failsafe::{CircuitBreaker, Config, StateMachine};

use crate::error::StoreError;

pub(crate) type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub(crate) type CircuitBreakerType = StateMachine<
    OrElse<SuccessRateOverTimeWindow<EqualJittered>, ConsecutiveFailures<EqualJittered>>,
    (),
>;

pub(crate) const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Turns on SQLite's foreign key enforcement, which is per connection and
/// off by default. The schema's cascade and restrict rules depend on it.
/// Also waits on a locked database instead of failing immediately.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        for pragma in ["PRAGMA foreign_keys = ON", "PRAGMA busy_timeout = 5000"] {
            diesel::sql_query(pragma)
                .execute(conn)
                .map_err(r2d2::Error::QueryError)?;
        }
        Ok(())
    }
}

pub(crate) fn build_pool(database_url: &str, max_size: u32) -> Result<DbPool, StoreError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .max_size(max_size)
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)?;
    Ok(pool)
}

pub(crate) fn run_migrations(conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| StoreError::Migration(e.to_string()))?;
    for version in applied {
        log::info!("applied migration {version}");
    }
    Ok(())
}

/// Shared handle to the database: a connection pool plus the circuit
/// breaker guarding it.
#[derive(Clone)]
pub(crate) struct Store {
    pool: DbPool,
    circuit_breaker: CircuitBreakerType,
}

impl Store {
    pub(crate) fn new(pool: DbPool) -> Self {
        Self {
            pool,
            circuit_breaker: Config::new().build(),
        }
    }

    /// Runs `operation` with a pooled connection on the blocking thread
    /// pool. Outages count against the circuit breaker; while it is open,
    /// calls fail fast with [`StoreError::Unavailable`].
    pub(crate) async fn run<F, T>(&self, operation: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        let circuit_breaker = self.circuit_breaker.clone();
        web::block(move || {
            let result = circuit_breaker.call_with(StoreError::is_outage, || {
                let mut conn = pool.get()?;
                operation(&mut *conn)
            });
            match result {
                Ok(value) => Ok(value),
                Err(failsafe::Error::Inner(err)) => Err(err),
                Err(failsafe::Error::Rejected) => {
                    //rejected which means the database is not responsive
                    log::warn!("circuit breaker open, rejecting store call");
                    Err(StoreError::Unavailable)
                }
            }
        })
        .await?
    }
}
