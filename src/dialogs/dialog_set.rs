//! Registry of dialogs by id

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::dialogs::{Dialog, dialog_identity};
use crate::error::{DialogError, DialogResult};

/// Dialogs addressable by id, in registration order
#[derive(Clone, Default)]
pub struct DialogSet {
    dialogs: Vec<Arc<dyn Dialog>>,
    index: HashMap<String, usize>,
}

impl DialogSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dialog
    ///
    /// Adding the same instance again is a no-op; a different instance under
    /// an id that is already taken is rejected.
    pub fn add(&mut self, dialog: Arc<dyn Dialog>) -> DialogResult<&mut Self> {
        if let Some(existing) = self.find(dialog.id()) {
            if dialog_identity(&existing) == dialog_identity(&dialog) {
                return Ok(self);
            }
            return Err(DialogError::DuplicateDialogId(dialog.id().to_string()));
        }

        self.index
            .insert(dialog.id().to_string(), self.dialogs.len());
        self.dialogs.push(dialog);
        Ok(self)
    }

    pub fn find(&self, dialog_id: &str) -> Option<Arc<dyn Dialog>> {
        self.index
            .get(dialog_id)
            .and_then(|&i| self.dialogs.get(i))
            .cloned()
    }

    pub fn contains(&self, dialog_id: &str) -> bool {
        self.index.contains_key(dialog_id)
    }

    /// True when this exact instance is registered
    pub fn contains_instance(&self, dialog: &Arc<dyn Dialog>) -> bool {
        let identity = dialog_identity(dialog);
        self.dialogs.iter().any(|d| dialog_identity(d) == identity)
    }

    pub fn dialogs(&self) -> &[Arc<dyn Dialog>] {
        &self.dialogs
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.dialogs.iter().map(|d| d.id())
    }

    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }

    /// Register `root` and every dialog reachable through containers below it
    ///
    /// Walks the tree with an explicit work list and a visited set keyed by
    /// instance identity, so shared subtrees and cycles are visited once. A
    /// descendant whose id is already taken by another instance is skipped;
    /// it stays reachable through its own container's set.
    pub fn add_tree(&mut self, root: Arc<dyn Dialog>) -> DialogResult<()> {
        self.add(root.clone())?;

        let mut visited: HashSet<usize> = HashSet::new();
        let mut pending: Vec<Arc<dyn Dialog>> = vec![root];

        while let Some(dialog) = pending.pop() {
            if !visited.insert(dialog_identity(&dialog)) {
                continue;
            }

            if !self.contains_instance(&dialog) {
                if self.contains(dialog.id()) {
                    warn!(
                        dialog_id = dialog.id(),
                        "dialog id already registered by another instance; skipping"
                    );
                    continue;
                }
                self.add(dialog.clone())?;
                debug!(dialog_id = dialog.id(), "registered nested dialog");
            }

            if let Some(container) = dialog.as_container() {
                // Reverse keeps registration in declaration order
                for inner in container.dialogs().dialogs().iter().rev() {
                    pending.push(inner.clone());
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for DialogSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}
