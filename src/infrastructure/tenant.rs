use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::infrastructure::db::PgPool;

/// Scopes row-level security to `tenant_id` for the lifetime of `tx`.
///
/// `set_config(..., true)` is transaction-local (`SET LOCAL` semantics):
/// the setting is cleared automatically on commit or rollback, so a
/// pooled connection can never leak one tenant's context into the next
/// caller that borrows it.
pub async fn set_tenant_context(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT set_config('app.current_tenant_id', $1, true)")
        .bind(tenant_id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Opens a transaction and immediately binds it to `tenant_id`. Every
/// service method that touches an RLS-protected table should start here
/// rather than calling `pool.begin()` directly.
pub async fn begin_scoped(
    pool: &PgPool,
    tenant_id: Uuid,
) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    set_tenant_context(&mut tx, tenant_id).await?;
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_id_round_trips_through_to_string() {
        let id = Uuid::new_v4();
        assert_eq!(id.to_string().parse::<Uuid>().unwrap(), id);
    }
}
