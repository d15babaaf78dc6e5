//! Release and reopen transitions
//!
//! Every transition runs in its own transaction and updates with a state
//! guard, so a second release of the same artifact is rejected even when
//! two callers race.

use crate::catalog::table;
use crate::error::Error;
use crate::PlmStore;
use orchestration::{
    CollaboratorError, Lifecycle, ReleaseKind, TransitionContext, TransitionError,
    is_released_state,
};

const RELEASED: &str = "released";
const DRAFT: &str = "draft";

fn unavailable(err: impl Into<Error>) -> TransitionError {
    TransitionError::Unavailable(CollaboratorError::new(err.into()))
}

fn label(kind: ReleaseKind) -> &'static str {
    match kind {
        ReleaseKind::RoutingRelease => "Routing",
        ReleaseKind::MbomRelease => "MBOM",
        ReleaseKind::BaselineRelease => "Baseline",
    }
}

fn current_state(store: &PlmStore, kind: ReleaseKind, id: &str) -> Result<String, TransitionError> {
    store
        .state_of(kind, id)
        .map_err(unavailable)?
        .ok_or_else(|| TransitionError::Rejected(format!("{} not found: {id}", label(kind))))
}

fn ensure_not_released(store: &PlmStore, kind: ReleaseKind, id: &str) -> Result<(), TransitionError> {
    if is_released_state(&current_state(store, kind, id)?) {
        return Err(TransitionError::Rejected(format!(
            "{} is already released",
            label(kind)
        )));
    }
    Ok(())
}

fn mark_released(store: &PlmStore, kind: ReleaseKind, id: &str, extra: &str) -> Result<(), TransitionError> {
    let sql = format!(
        "UPDATE {} SET state = ?2{extra} WHERE id = ?1 AND lower(state) != ?2",
        table(kind)
    );
    let changed = store
        .conn()
        .execute(&sql, [id, RELEASED])
        .map_err(unavailable)?;
    if changed == 0 {
        return Err(TransitionError::Rejected(format!(
            "{} is already released",
            label(kind)
        )));
    }
    Ok(())
}

fn reopen_released(store: &PlmStore, kind: ReleaseKind, id: &str) -> Result<String, TransitionError> {
    let tx = store.conn().unchecked_transaction().map_err(unavailable)?;
    let state = current_state(store, kind, id)?;
    if !is_released_state(&state) {
        return Err(TransitionError::Rejected(format!(
            "Only released {}s can be reopened",
            kind.resource_type()
        )));
    }

    let sql = format!(
        "UPDATE {} SET state = ?2 WHERE id = ?1 AND lower(state) = ?3",
        table(kind)
    );
    let changed = store
        .conn()
        .execute(&sql, [id, DRAFT, RELEASED])
        .map_err(unavailable)?;
    if changed == 0 {
        return Err(TransitionError::Rejected(format!(
            "Only released {}s can be reopened",
            kind.resource_type()
        )));
    }
    tx.commit().map_err(unavailable)?;

    log::info!("Reopened {} {id}", kind.resource_type());
    Ok(DRAFT.to_string())
}

/// Routing transitions
pub(crate) struct RoutingLifecycle<'a> {
    pub store: &'a PlmStore,
}

impl Lifecycle for RoutingLifecycle<'_> {
    fn release(
        &self,
        resource_id: &str,
        _ctx: &TransitionContext<'_>,
    ) -> Result<String, TransitionError> {
        let kind = ReleaseKind::RoutingRelease;
        let tx = self.store.conn().unchecked_transaction().map_err(unavailable)?;
        ensure_not_released(self.store, kind, resource_id)?;

        let operations: i64 = self
            .store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM routing_operations WHERE routing_id = ?1",
                [resource_id],
                |row| row.get(0),
            )
            .map_err(unavailable)?;
        if operations == 0 {
            return Err(TransitionError::Rejected(
                "Routing requires at least one operation".to_string(),
            ));
        }

        mark_released(self.store, kind, resource_id, "")?;
        tx.commit().map_err(unavailable)?;
        log::info!("Released routing {resource_id}");
        Ok(RELEASED.to_string())
    }

    fn reopen(&self, resource_id: &str) -> Result<String, TransitionError> {
        reopen_released(self.store, ReleaseKind::RoutingRelease, resource_id)
    }
}

/// MBOM transitions
pub(crate) struct MbomLifecycle<'a> {
    pub store: &'a PlmStore,
}

impl Lifecycle for MbomLifecycle<'_> {
    fn release(
        &self,
        resource_id: &str,
        _ctx: &TransitionContext<'_>,
    ) -> Result<String, TransitionError> {
        let kind = ReleaseKind::MbomRelease;
        let tx = self.store.conn().unchecked_transaction().map_err(unavailable)?;
        ensure_not_released(self.store, kind, resource_id)?;

        if self.store.mbom_line_count(resource_id).map_err(unavailable)? == 0 {
            return Err(TransitionError::Rejected(
                "MBOM requires at least one line".to_string(),
            ));
        }
        if self
            .store
            .released_routing_count(resource_id)
            .map_err(unavailable)?
            == 0
        {
            return Err(TransitionError::Rejected(
                "MBOM requires at least one released routing before release".to_string(),
            ));
        }

        mark_released(self.store, kind, resource_id, "")?;
        tx.commit().map_err(unavailable)?;
        log::info!("Released MBOM {resource_id}");
        Ok(RELEASED.to_string())
    }

    fn reopen(&self, resource_id: &str) -> Result<String, TransitionError> {
        reopen_released(self.store, ReleaseKind::MbomRelease, resource_id)
    }
}

/// Baseline transitions
///
/// Release validates member references unless the baseline was already
/// validated or the caller forces it.
pub(crate) struct BaselineLifecycle<'a> {
    pub store: &'a PlmStore,
}

impl BaselineLifecycle<'_> {
    fn is_validated(&self, baseline_id: &str) -> Result<bool, TransitionError> {
        self.store
            .conn()
            .query_row(
                "SELECT is_validated FROM baselines WHERE id = ?1",
                [baseline_id],
                |row| row.get(0),
            )
            .map_err(unavailable)
    }
}

impl Lifecycle for BaselineLifecycle<'_> {
    fn release(
        &self,
        resource_id: &str,
        ctx: &TransitionContext<'_>,
    ) -> Result<String, TransitionError> {
        let kind = ReleaseKind::BaselineRelease;
        let tx = self.store.conn().unchecked_transaction().map_err(unavailable)?;
        ensure_not_released(self.store, kind, resource_id)?;

        if !ctx.force && !self.is_validated(resource_id)? {
            let issues = self
                .store
                .missing_members(resource_id, "baseline.members_references_exist")
                .map_err(unavailable)?;
            if !issues.is_empty() {
                let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
                return Err(TransitionError::Rejected(format!(
                    "Baseline validation failed: {}",
                    messages.join("; ")
                )));
            }
        }

        mark_released(self.store, kind, resource_id, ", is_validated = 1")?;
        tx.commit().map_err(unavailable)?;
        log::info!(
            "Released baseline {resource_id} (ruleset {}, force={})",
            ctx.ruleset_id,
            ctx.force
        );
        Ok(RELEASED.to_string())
    }

    fn reopen(&self, resource_id: &str) -> Result<String, TransitionError> {
        reopen_released(self.store, ReleaseKind::BaselineRelease, resource_id)
    }
}
