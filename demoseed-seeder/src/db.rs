//! Direct datastore mutations for backfill
//!
//! The form interface cannot set timestamps or owners, so these run as
//! parameterized UPDATEs scoped to the tenant column, one transaction per
//! batch with an explicit commit at the end. Table and column names come
//! from configuration, never from record payloads.

use crate::models::TemporalAssignment;
use crate::services::entity_adapter::EntityAdapter;
use demoseed_common::Result;
use sqlx::MySqlPool;
use tracing::debug;

/// Write the planned creation/modification timestamps for a batch.
pub async fn apply_temporal_assignments(
    pool: &MySqlPool,
    adapter: &dyn EntityAdapter,
    assignments: &[TemporalAssignment],
    site_id: i64,
) -> Result<()> {
    if assignments.is_empty() {
        return Ok(());
    }

    let (created_column, modified_column) = adapter.date_columns();
    let sql = format!(
        "UPDATE {table} SET {created_column} = ?, {modified_column} = ? \
         WHERE {id_column} = ? AND {tenant_column} = ?",
        table = adapter.table(),
        id_column = adapter.id_column(),
        tenant_column = adapter.tenant_column(),
    );

    let mut tx = pool.begin().await?;
    for assignment in assignments {
        sqlx::query(&sql)
            .bind(assignment.created_at)
            .bind(assignment.modified_at)
            .bind(assignment.entity_id)
            .bind(site_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    debug!(
        table = adapter.table(),
        records = assignments.len(),
        "Timestamp backfill committed"
    );
    Ok(())
}

/// User ids available for ownership round-robin: everyone but the
/// administrator, or everyone when the administrator is the only account.
pub async fn fetch_available_user_ids(
    pool: &MySqlPool,
    user_table: &str,
    user_id_column: &str,
    admin_user_id: i64,
) -> Result<Vec<i64>> {
    let sql = format!(
        "SELECT {column} FROM {table} WHERE {column} != ? ORDER BY {column}",
        column = user_id_column,
        table = user_table,
    );
    let rows: Vec<(i64,)> = sqlx::query_as(&sql).bind(admin_user_id).fetch_all(pool).await?;
    if !rows.is_empty() {
        return Ok(rows.into_iter().map(|(id,)| id).collect());
    }

    let sql = format!(
        "SELECT {column} FROM {table} ORDER BY {column}",
        column = user_id_column,
        table = user_table,
    );
    let rows: Vec<(i64,)> = sqlx::query_as(&sql).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Write owner assignments for a batch.
pub async fn apply_owner_assignments(
    pool: &MySqlPool,
    adapter: &dyn EntityAdapter,
    owners: &[(i64, i64)],
    site_id: i64,
) -> Result<()> {
    if owners.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "UPDATE {table} SET {owner_column} = ? WHERE {id_column} = ? AND {tenant_column} = ?",
        table = adapter.table(),
        owner_column = adapter.owner_column(),
        id_column = adapter.id_column(),
        tenant_column = adapter.tenant_column(),
    );

    let mut tx = pool.begin().await?;
    for (entity_id, owner_id) in owners {
        sqlx::query(&sql)
            .bind(owner_id)
            .bind(entity_id)
            .bind(site_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    debug!(
        table = adapter.table(),
        records = owners.len(),
        "Ownership backfill committed"
    );
    Ok(())
}
