//! Repository functions for the `resources` table: one row per managed
//! resource instance, keyed by its address.
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone)]
pub struct StoredResource {
    pub id: i64,
    pub address: String,
    pub resource_type: String,
    /// Remote reference; authoritative input to read, update and delete.
    pub reference: String,
    pub attributes: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn from_row(row: SqliteRow) -> sqlx::Result<StoredResource> {
    let attributes: String = row.get("attributes");
    let attributes =
        serde_json::from_str(&attributes).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    Ok(StoredResource {
        id: row.get("id"),
        address: row.get("address"),
        resource_type: row.get("resource_type"),
        reference: row.get("reference"),
        attributes,
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
    })
}

pub async fn find_by_address(
    db: &SqlitePool,
    address: &str,
) -> sqlx::Result<Option<StoredResource>> {
    let row = sqlx::query(
        r#"
        SELECT id, address, resource_type, reference, attributes, created_at, updated_at
        FROM resources
        WHERE address = ?
        "#,
    )
    .bind(address)
    .fetch_optional(db)
    .await?;

    row.map(from_row).transpose()
}

pub async fn list(db: &SqlitePool) -> sqlx::Result<Vec<StoredResource>> {
    let rows = sqlx::query(
        r#"
        SELECT id, address, resource_type, reference, attributes, created_at, updated_at
        FROM resources
        ORDER BY address
        "#,
    )
    .fetch_all(db)
    .await?;

    rows.into_iter().map(from_row).collect()
}

/// Insert or replace the row for `address`, keeping its creation time.
pub async fn upsert(
    db: &SqlitePool,
    address: &str,
    resource_type: &str,
    reference: &str,
    attributes: &Value,
) -> sqlx::Result<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO resources (address, resource_type, reference, attributes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(address) DO UPDATE SET
            resource_type = excluded.resource_type,
            reference = excluded.reference,
            attributes = excluded.attributes,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(address)
    .bind(resource_type)
    .bind(reference)
    .bind(attributes.to_string())
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    Ok(())
}

/// Returns whether a row was removed.
pub async fn remove(db: &SqlitePool, address: &str) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM resources WHERE address = ?")
        .bind(address)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
