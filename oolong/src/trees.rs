use crate::forest::{Child, Forest, NodeId};
use log::debug;
use std::collections::{HashMap, HashSet};


/// Branch picked for each node reachable from a resolved root.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Resolution {
    // None while the node is being resolved further up the stack
    chosen: HashMap<NodeId, Option<usize>>,
}

impl Resolution {
    /// Index of the branch chosen for `id`, if it was resolved.
    pub fn branch(&self, id: NodeId) -> Option<usize> {
        self.chosen.get(&id).copied().flatten()
    }

    pub fn len(&self) -> usize { self.chosen.len() }

    pub fn is_empty(&self) -> bool { self.chosen.is_empty() }
}

impl<T, V> Forest<'_, T, V> {
    /// Collapse the ambiguity below `root` asking each node's chooser for a
    /// branch. `None` when some chooser declines.
    pub fn choose(&self, root: NodeId) -> Option<Resolution> {
        let mut resolution = Resolution::default();
        match self.choose_helper(root, &mut resolution) {
            true => Some(resolution),
            false => None,
        }
    }

    // A node already in the map (even half-way resolved) counts as success.
    // That breaks cycles, trusting the caller up the stack to finish it.
    fn choose_helper(&self, id: NodeId, resolution: &mut Resolution) -> bool {
        if resolution.chosen.contains_key(&id) {
            return true;
        }
        let Some(node) = self.get(id) else { return false };
        resolution.chosen.insert(id, None);
        let branch = match node.production().choose(self, node) {
            Some(branch) if branch < node.branches().len() => branch,
            _ => {
                debug!("chooser declined {:?} @{}..{}", node.production().id(), node.start(), node.end());
                return false;
            }
        };
        for child in &node.branches()[branch] {
            if let Child::Node(child) = child {
                if !self.choose_helper(*child, resolution) {
                    return false;
                }
            }
        }
        resolution.chosen.insert(id, Some(branch));
        true
    }

    /// Resolve the ambiguity below `root` and reduce it to a value.
    /// `None` when a chooser rejects every reading.
    pub fn accept(&self, root: NodeId) -> Option<V> {
        let resolution = self.choose(root)?;
        self.accept_with(root, &resolution)
    }

    /// Reduce `root` bottom-up following the branches in `resolution`.
    /// `None` if a node was left unresolved or the chosen branches loop, and
    /// also when `root` or `resolution` belong to another forest and name a
    /// node or branch this one lacks.
    pub fn accept_with(&self, root: NodeId, resolution: &Resolution) -> Option<V> {
        let mut active = HashSet::new();
        self.reduce(root, resolution, &mut active)
    }

    fn reduce(&self, id: NodeId, resolution: &Resolution, active: &mut HashSet<NodeId>) -> Option<V> {
        let branch = resolution.branch(id)?;
        if !active.insert(id) {
            debug!("chosen branches loop through {:?}", id);
            return None;
        }
        let node = self.get(id)?;
        let children = node.branches().get(branch)?;
        let mut args = Vec::with_capacity(children.len());
        for child in children {
            args.push(match child {
                Child::Token(idx) => self.grammar().leaf(self.token(*idx)),
                Child::Node(child) => self.reduce(*child, resolution, active)?,
            });
        }
        active.remove(&id);
        Some(node.production().reduce(args))
    }
}
