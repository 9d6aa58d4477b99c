use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Local key/value ledger emulating per-contract storage slots.
///
/// Values are opaque bytes; each `(contract, key)` pair holds exactly one
/// value and writes replace it wholesale.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub contract_address: String,
    pub key: String,
    pub value: Vec<u8>,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open ledger database '{database_url}'"))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Confirms the ledger answers queries against the migrated schema.
    pub async fn health_check(&self) -> Result<()> {
        let slots: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contract_data")
            .fetch_one(&self.pool)
            .await
            .context("ledger did not answer a schema query")?;
        debug!(slots, "ledger health check passed");
        Ok(())
    }

    /// Returns the stored bytes, or an empty vector for a slot never written.
    pub async fn get_data(&self, contract_address: &str, key: &str) -> Result<Vec<u8>> {
        let row = sqlx::query(
            "SELECT data_value FROM contract_data WHERE contract_address = ? AND data_key = ?",
        )
        .bind(normalize_address(contract_address))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to read key '{key}'"))?;

        match row {
            Some(row) => Ok(row.try_get::<Vec<u8>, _>("data_value")?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn set_data(&self, contract_address: &str, key: &str, value: &[u8]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO contract_data (contract_address, data_key, data_value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (contract_address, data_key)
            DO UPDATE SET data_value = excluded.data_value, updated_at = excluded.updated_at
            "#,
        )
        .bind(normalize_address(contract_address))
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write key '{key}'"))?;

        debug!(
            contract = contract_address,
            key,
            bytes = value.len(),
            "ledger slot written"
        );
        Ok(())
    }

    pub async fn clear_data(&self, contract_address: &str, key: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM contract_data WHERE contract_address = ? AND data_key = ?")
                .bind(normalize_address(contract_address))
                .bind(key)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to clear key '{key}'"))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_entries(&self, contract_address: &str) -> Result<Vec<StoredEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT contract_address, data_key, data_value, updated_at
            FROM contract_data
            WHERE contract_address = ?
            ORDER BY data_key
            "#,
        )
        .bind(normalize_address(contract_address))
        .fetch_all(&self.pool)
        .await
        .context("failed to list ledger entries")?;

        rows.into_iter()
            .map(|row| {
                Ok(StoredEntry {
                    contract_address: row.try_get("contract_address")?,
                    key: row.try_get("data_key")?,
                    value: row.try_get("data_value")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect()
    }

    /// Contracts are available until explicitly switched off.
    pub async fn is_available(&self, contract_address: &str) -> Result<bool> {
        let available: Option<i64> =
            sqlx::query_scalar("SELECT available FROM contract_status WHERE contract_address = ?")
                .bind(normalize_address(contract_address))
                .fetch_optional(&self.pool)
                .await
                .context("failed to read contract status")?;
        Ok(available.map_or(true, |flag| flag != 0))
    }

    pub async fn set_available(&self, contract_address: &str, available: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO contract_status (contract_address, available, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (contract_address)
            DO UPDATE SET available = excluded.available, updated_at = excluded.updated_at
            "#,
        )
        .bind(normalize_address(contract_address))
        .bind(i64::from(available))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to update contract status")?;
        Ok(())
    }
}

fn normalize_address(contract_address: &str) -> String {
    contract_address.trim().to_ascii_lowercase()
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
