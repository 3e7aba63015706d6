//! UI Permission Gate
//!
//! A reactive visibility toggle bound to a [`PermissionRequirement`]. The
//! gate subscribes to the session's permission snapshot and re-evaluates on
//! every change notification and on every requirement swap, instead of being
//! tied to a rendering lifecycle. Hidden means invisible, not gone: the gate
//! object stays alive so toggling back is cheap and disturbs nothing around
//! it.

use tokio::sync::watch;

use crate::permissions::{evaluate, PermissionRequirement};
use crate::session::SessionStore;

/// Reactive visibility gate over the granted permission set
pub struct PermissionGate {
    requirement: PermissionRequirement,
    permissions: watch::Receiver<Vec<String>>,
    visible: bool,
}

impl PermissionGate {
    /// Bind a gate to the store's permission snapshot
    pub fn new(session: &SessionStore, requirement: PermissionRequirement) -> Self {
        let permissions = session.subscribe_permissions();
        let visible = evaluate(&requirement, permissions.borrow().as_slice());
        Self {
            requirement,
            permissions,
            visible,
        }
    }

    /// Whether the gated element should be visible
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Swap the requirement and re-evaluate immediately
    pub fn set_requirement(&mut self, requirement: PermissionRequirement) -> bool {
        self.requirement = requirement;
        self.refresh()
    }

    /// Re-evaluate against the latest snapshot
    pub fn refresh(&mut self) -> bool {
        let snapshot = self.permissions.borrow_and_update().clone();
        self.visible = evaluate(&self.requirement, &snapshot);
        self.visible
    }

    /// Wait for the next snapshot change and re-evaluate
    ///
    /// When the store is gone the channel closes and the gate keeps its
    /// last state.
    pub async fn changed(&mut self) -> bool {
        if self.permissions.changed().await.is_ok() {
            self.refresh();
        }
        self.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::MemoryStorage;

    fn store() -> SessionStore {
        SessionStore::new(
            Config::with_base_url("http://127.0.0.1:9"),
            Box::new(MemoryStorage::new()),
        )
    }

    #[test]
    fn gate_starts_from_current_snapshot() {
        let session = store();
        let gate = PermissionGate::new(&session, PermissionRequirement::from("view users"));
        assert!(!gate.visible());

        // Vacuous requirement is visible even with nothing granted
        let gate = PermissionGate::new(&session, PermissionRequirement::Many(vec![]));
        assert!(gate.visible());
    }

    #[test]
    fn set_requirement_reevaluates() {
        let session = store();
        let mut gate = PermissionGate::new(&session, PermissionRequirement::from("view users"));
        assert!(!gate.visible());
        assert!(gate.set_requirement(PermissionRequirement::Many(vec![])));
    }
}
