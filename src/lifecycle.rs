//! Apply / refresh / destroy of single resource instances against the state
//! store. This plays the part of the infrastructure tool that owns the state.
use serde_json::Value;
use tracing::{info, warn};

use crate::ProviderContext;
use crate::db::{Db, state_repo};
use crate::resources::{Applied, DispatchError, ReadOutcome, ResourceKind};

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Resource(#[from] DispatchError),

    #[error("state store: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("'{address}' is a {stored}, not a {requested}")]
    KindChanged {
        address: String,
        stored: String,
        requested: ResourceKind,
    },

    #[error("'{0}' is not managed")]
    NotManaged(String),

    #[error("stored resource '{address}' has unknown type '{kind}'")]
    CorruptState { address: String, kind: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyAction {
    Created,
    Updated,
    /// The stored object had disappeared remotely and was created again.
    Recreated,
}

fn stored_kind(stored: &state_repo::StoredResource) -> Result<ResourceKind, LifecycleError> {
    stored
        .resource_type
        .parse()
        .map_err(|_| LifecycleError::CorruptState {
            address: stored.address.clone(),
            kind: stored.resource_type.clone(),
        })
}

/// Create the resource at `address`, or update it in place when it is
/// already in state.
pub async fn apply(
    ctx: &ProviderContext,
    db: &Db,
    address: &str,
    kind: ResourceKind,
    planned: Value,
) -> Result<(ApplyAction, Applied<Value>), LifecycleError> {
    let handler = kind.handler();
    let stored = state_repo::find_by_address(db, address).await?;

    let (action, applied) = match stored {
        None => (ApplyAction::Created, handler.create_document(ctx, planned).await?),
        Some(stored) => {
            if stored.resource_type != kind.as_str() {
                return Err(LifecycleError::KindChanged {
                    address: address.to_string(),
                    stored: stored.resource_type,
                    requested: kind,
                });
            }
            match handler
                .read_document(ctx, &stored.reference, stored.attributes)
                .await?
            {
                ReadOutcome::Present(current) => {
                    let applied = handler
                        .update_document(ctx, &stored.reference, current, planned)
                        .await?;
                    (ApplyAction::Updated, applied)
                }
                ReadOutcome::Absent => {
                    warn!(%address, reference = %stored.reference, "object vanished, creating it again");
                    (
                        ApplyAction::Recreated,
                        handler.create_document(ctx, planned).await?,
                    )
                }
            }
        }
    };

    state_repo::upsert(db, address, kind.as_str(), &applied.id, &applied.state).await?;
    info!(%address, reference = %applied.id, ?action, "applied");
    Ok((action, applied))
}

/// Re-read the stored object. Returns `None` (and forgets the resource) when
/// it no longer exists remotely.
pub async fn refresh(
    ctx: &ProviderContext,
    db: &Db,
    address: &str,
) -> Result<Option<Value>, LifecycleError> {
    let stored = state_repo::find_by_address(db, address)
        .await?
        .ok_or_else(|| LifecycleError::NotManaged(address.to_string()))?;
    let kind = stored_kind(&stored)?;

    match kind
        .handler()
        .read_document(ctx, &stored.reference, stored.attributes)
        .await?
    {
        ReadOutcome::Present(state) => {
            state_repo::upsert(db, address, kind.as_str(), &stored.reference, &state).await?;
            Ok(Some(state))
        }
        ReadOutcome::Absent => {
            warn!(%address, reference = %stored.reference, "object is gone, dropping it from state");
            state_repo::remove(db, address).await?;
            Ok(None)
        }
    }
}

/// Destroy the resource at `address`. `planned` is the current configuration
/// when it differs from the stored state (e.g. to catch view changes).
/// Returns `false` when nothing was managed at that address.
pub async fn destroy(
    ctx: &ProviderContext,
    db: &Db,
    address: &str,
    planned: Option<Value>,
) -> Result<bool, LifecycleError> {
    let Some(stored) = state_repo::find_by_address(db, address).await? else {
        return Ok(false);
    };
    let kind = stored_kind(&stored)?;
    let planned = planned.unwrap_or_else(|| stored.attributes.clone());

    kind.handler()
        .delete_document(ctx, &stored.reference, stored.attributes, planned)
        .await?;
    state_repo::remove(db, address).await?;
    info!(%address, reference = %stored.reference, "destroyed");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::resources::testing;
    use serde_json::json;

    async fn store() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let db = init_db(&dir.path().join("state.db")).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn apply_creates_then_updates_in_place() {
        let (_dir, db) = store().await;
        let (ctx, grid) = testing::context();

        let (action, created) = apply(
            &ctx,
            &db,
            "a_record.web",
            ResourceKind::ARecord,
            json!({"fqdn": "web.test.com", "ip_addr": "10.0.0.2"}),
        )
        .await
        .unwrap();
        assert_eq!(action, ApplyAction::Created);

        let (action, updated) = apply(
            &ctx,
            &db,
            "a_record.web",
            ResourceKind::ARecord,
            json!({"fqdn": "web.test.com", "ip_addr": "10.0.0.3", "ttl": 300}),
        )
        .await
        .unwrap();
        assert_eq!(action, ApplyAction::Updated);
        assert_eq!(updated.id, created.id);
        assert_eq!(grid.a_record_count().await, 1);

        let stored = state_repo::find_by_address(&db, "a_record.web")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.attributes["ip_addr"], "10.0.0.3");
        assert_eq!(stored.attributes["ttl"], 300);
    }

    #[tokio::test]
    async fn kind_cannot_change_under_an_address() {
        let (_dir, db) = store().await;
        let (ctx, _grid) = testing::context();
        apply(
            &ctx,
            &db,
            "rec",
            ResourceKind::ARecord,
            json!({"fqdn": "web.test.com", "ip_addr": "10.0.0.2"}),
        )
        .await
        .unwrap();
        let err = apply(
            &ctx,
            &db,
            "rec",
            ResourceKind::AaaaRecord,
            json!({"fqdn": "web.test.com", "ipv6_addr": "2000::2"}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "'rec' is a a_record, not a aaaa_record");
    }

    #[tokio::test]
    async fn refresh_drops_vanished_objects_and_destroy_forgets() {
        let (_dir, db) = store().await;
        let (ctx, grid) = testing::context();
        let (_, created) = apply(
            &ctx,
            &db,
            "a_record.web",
            ResourceKind::ARecord,
            json!({"fqdn": "web.test.com", "ip_addr": "10.0.0.2"}),
        )
        .await
        .unwrap();
        assert!(refresh(&ctx, &db, "a_record.web").await.unwrap().is_some());

        use crate::infoblox::ObjectManager;
        grid.delete_a_record(&created.id).await.unwrap();
        assert!(refresh(&ctx, &db, "a_record.web").await.unwrap().is_none());
        assert!(matches!(
            refresh(&ctx, &db, "a_record.web").await,
            Err(LifecycleError::NotManaged(_))
        ));

        apply(
            &ctx,
            &db,
            "a_record.web",
            ResourceKind::ARecord,
            json!({"fqdn": "web.test.com", "ip_addr": "10.0.0.2"}),
        )
        .await
        .unwrap();
        assert!(destroy(&ctx, &db, "a_record.web", None).await.unwrap());
        assert!(!destroy(&ctx, &db, "a_record.web", None).await.unwrap());
        assert_eq!(grid.a_record_count().await, 0);
    }
}
