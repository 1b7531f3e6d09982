//! PostgreSQL pool setup.

use crate::config::Config;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub type Pool = PgPool;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool options derived from the server configuration.
pub fn pool_options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
}

/// Connect to `DATABASE_URL`, failing fast if the database is down.
pub async fn connect(config: &Config) -> Result<Pool, sqlx::Error> {
    pool_options(config).connect(&config.database_url).await
}

/// Whether the database answers a trivial query.
pub async fn ping(pool: &Pool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

/// Apply `migrations/` (the `records` table and its indexes).
pub async fn run_migrations(pool: &Pool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_config() {
        let config = Config {
            host: "127.0.0.1".into(),
            port: 3000,
            database_url: "postgres://localhost/tandem".into(),
            max_connections: 4,
        };

        let options = pool_options(&config);
        assert_eq!(options.get_max_connections(), 4);
        assert_eq!(options.get_acquire_timeout(), ACQUIRE_TIMEOUT);
    }
}
