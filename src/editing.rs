// ✏️ Editing - reconcile a submitted entity and commit the merge
//
// validate -> read current -> reconcile -> conditional update -> re-read
//
// The read happens outside any transaction. The update takes the write
// lock and only lands if the stored version is still the one that was
// read; otherwise the edit is a conflict and nothing is written.

use crate::db::{self, Session, StoreResult, Stored};
use crate::entities::{Client, ClientPayload, House, HousePayload};
use crate::error::{AppError, AppResult};
use crate::reconciliation::{EntityReconciler, Reconcilable, ReconciliationOutcome};
use rusqlite::Connection;

pub fn edit_client(
    session: &Session,
    reconciler: &EntityReconciler<Client>,
    payload: ClientPayload,
) -> AppResult<Client> {
    payload.validate_for_edit()?;
    let id = payload
        .id
        .ok_or_else(|| AppError::validation("request must contain 'id'"))?;

    reconcile_and_commit(
        session,
        reconciler,
        id,
        |current| payload.into_proposed(current),
        db::update_client,
        "login or phone number already exists",
    )
}

pub fn edit_house(
    session: &Session,
    reconciler: &EntityReconciler<House>,
    payload: HousePayload,
) -> AppResult<House> {
    payload.validate_for_edit()?;
    let id = payload
        .id
        .ok_or_else(|| AppError::validation("request must contain 'id'"))?;

    reconcile_and_commit(
        session,
        reconciler,
        id,
        |current| payload.into_proposed(current),
        db::update_house,
        "address already exists",
    )
}

fn reconcile_and_commit<E>(
    session: &Session,
    reconciler: &EntityReconciler<E>,
    id: i64,
    propose: impl FnOnce(&E) -> E,
    commit: fn(&Connection, &E) -> StoreResult<bool>,
    duplicate_message: &str,
) -> AppResult<E>
where
    E: Reconcilable + Stored<Key = i64>,
{
    let current: E = session
        .get(&id)?
        .ok_or_else(|| AppError::not_found(format!("{} {} not found", E::KIND, id)))?;
    let proposed = propose(&current);

    let merged = match reconciler.reconcile(&current, &proposed)? {
        ReconciliationOutcome::NoChange => {
            return Err(AppError::conflict(format!(
                "{} {} is already up to date",
                E::KIND,
                id
            )));
        }
        ReconciliationOutcome::Merged { entity, .. } => entity,
    };

    let tx = session
        .begin_immediate()
        .map_err(|e| write_failure::<E>(e, id, duplicate_message))?;
    let committed = commit(&tx, &merged).map_err(|e| write_failure::<E>(e, id, duplicate_message))?;
    if !committed {
        return Err(concurrent_edit::<E>(id));
    }

    let stored: E = session
        .get(&id)?
        .ok_or_else(|| AppError::internal(format!("{} {} vanished during edit", E::KIND, id)))?;
    tx.commit().map_err(db::StoreError::from)?;

    Ok(stored)
}

fn concurrent_edit<E: Reconcilable>(id: i64) -> AppError {
    AppError::conflict(format!("{} {} was modified concurrently", E::KIND, id))
}

/// A writer that could not get the lock lost the race to another edit
fn write_failure<E: Reconcilable>(err: db::StoreError, id: i64, duplicate_message: &str) -> AppError {
    if err.is_busy() {
        tracing::debug!(kind = E::KIND, id, error = %err, "edit lost the write lock");
        concurrent_edit::<E>(id)
    } else {
        AppError::from_store_conflict(err, duplicate_message)
    }
}

// ============================================================================
// TESTS
// ============================================================================
