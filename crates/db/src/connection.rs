use std::time::Duration;

use salesbot_core::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

/// Opens the session store. File databases are created on first use; an in-memory
/// database lives as long as its pool, so it is pinned to a single connection.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let in_memory = is_in_memory(database_url);
    let url = if database_url == ":memory:" { "sqlite::memory:" } else { database_url };
    let options = url.parse::<SqliteConnectOptions>()?.create_if_missing(true);
    let max_connections = if in_memory { 1 } else { max_connections.max(1) };

    debug!(
        event_name = "db.pool.connecting",
        in_memory,
        max_connections,
        timeout_secs,
        "opening sqlite pool"
    );

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::{connect_with_settings, is_in_memory};

    #[test]
    fn memory_urls_are_detected() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory(":memory:"));
        assert!(is_in_memory("sqlite://file:slots?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://salesbot.db"));
    }

    #[tokio::test]
    async fn bare_memory_alias_connects() {
        let pool = connect_with_settings(":memory:", 8, 5).await.expect("connect");
        let value: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.expect("select");
        assert_eq!(value, 1);
    }
}
