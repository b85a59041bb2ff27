pub mod api;
pub mod config;
pub mod transport;
pub mod transport_axum;
pub mod upload;

use schema::{CaseBatch, CaseId, CasePatch, CaseRecord, LinkStatus};
use store::{CaseStore, StoreError};

/// Append every record of `batch`. Returns the number of records appended.
pub async fn insert_cases(store: &CaseStore, batch: CaseBatch) -> Result<usize, StoreError> {
    let records = batch.into_records();
    let ids: Vec<CaseId> = records.iter().map(|record| record.id).collect();
    let count = store.push(records).await?;
    tracing::info!(count, ?ids, "cases inserted");
    Ok(count)
}

pub async fn patch_case(
    store: &CaseStore,
    id: CaseId,
    patch: &CasePatch,
) -> Result<Option<CaseRecord>, StoreError> {
    let updated = store.update(id, patch).await?;
    match &updated {
        Some(_) => tracing::info!(case_id = id, "case patched"),
        None => tracing::debug!(case_id = id, "patch target not found"),
    }
    Ok(updated)
}

pub async fn link_status(store: &CaseStore, id: CaseId) -> Result<Option<LinkStatus>, StoreError> {
    Ok(store.find(id).await?.as_ref().map(LinkStatus::from))
}

/// Record the confirmation URL handed out by the external system. A later
/// assignment overwrites an earlier one.
pub async fn assign_confirm_link(
    store: &CaseStore,
    id: CaseId,
    link: &str,
) -> Result<Option<CaseRecord>, StoreError> {
    let updated = store.update(id, &CasePatch::confirm_url(link)).await?;
    if updated.is_some() {
        tracing::info!(case_id = id, "confirmation link assigned");
    }
    Ok(updated)
}
