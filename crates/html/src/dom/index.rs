//! Id lookup index for the document.
//!
//! Several nodes may carry the same id for a while (a detached snapshot copy,
//! or markup the host page got wrong), so each id maps to a small list and
//! callers filter by attachment.

use std::collections::HashMap;

use indextree::NodeId;
use smallvec::SmallVec;

#[derive(Debug, Default)]
pub(super) struct IdIndex {
    by_id: HashMap<String, SmallVec<NodeId, 2>>,
}

impl IdIndex {
    pub(super) fn insert(&mut self, id: &str, node: NodeId) {
        let list = self.by_id.entry(id.to_owned()).or_default();
        if !list.contains(&node) {
            list.push(node);
        }
    }

    pub(super) fn remove(&mut self, id: &str, node: NodeId) {
        let Some(list) = self.by_id.get_mut(id) else {
            return;
        };
        if let Some(position) = list.iter().position(|candidate| *candidate == node) {
            list.remove(position);
        }
        if list.is_empty() {
            self.by_id.remove(id);
        }
    }

    pub(super) fn candidates(&self, id: &str) -> &[NodeId] {
        self.by_id
            .get(id)
            .map(|list| list.as_slice())
            .unwrap_or_default()
    }
}
