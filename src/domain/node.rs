use std::collections::HashSet;
use std::fmt;

use tracing::{debug, instrument};

use crate::domain::id::{IdGenerator, NodeId, RandomIdGenerator};
use crate::domain::iter::{PostOrderIterator, TreeIterator};
use crate::errors::{TreeError, TreeResult};

/// One node of a rooted tree, owning its children exclusively.
///
/// Dropping a node drops its whole subtree. Lookups, removal and folds
/// operate on the subtree rooted at the receiver; "not found" is reported
/// through `bool`/`Option`, never through an error.
pub struct TreeNode<M> {
    /// Immutable after construction
    id: NodeId,
    /// Id of the node this one was last attached to, None for roots
    parent_id: Option<NodeId>,
    /// Owned children in insertion order
    children: Vec<TreeNode<M>>,
    /// Caller-defined payload, never interpreted here
    metadata: Option<M>,
}

// Builds the copy bottom-up from an explicit stack of (source, finished
// children) frames; ids and parent ids are copied unchanged.
impl<M: Clone> Clone for TreeNode<M> {
    fn clone(&self) -> Self {
        let mut stack: Vec<(&TreeNode<M>, Vec<TreeNode<M>>)> =
            vec![(self, Vec::with_capacity(self.children.len()))];
        loop {
            let top = stack.len() - 1;
            let source = stack[top].0;
            if let Some(child) = source.children.get(stack[top].1.len()) {
                stack.push((child, Vec::with_capacity(child.children.len())));
                continue;
            }
            let (source, children) = stack.swap_remove(top);
            let node = TreeNode {
                id: source.id,
                parent_id: source.parent_id,
                children,
                metadata: source.metadata.clone(),
            };
            match stack.last_mut() {
                Some((_, siblings)) => siblings.push(node),
                None => return node,
            }
        }
    }
}

/// Shows the node itself; children are listed by id only.
impl<M: fmt::Debug> fmt::Debug for TreeNode<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let children: Vec<NodeId> = self.children.iter().map(|child| child.id).collect();
        f.debug_struct("TreeNode")
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .field("metadata", &self.metadata)
            .field("children", &children)
            .finish()
    }
}

impl<M> Default for TreeNode<M> {
    fn default() -> Self {
        Self::new(None)
    }
}

// Tear the subtree down with an explicit stack so very deep chains do not
// recurse once per level.
impl<M> Drop for TreeNode<M> {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

impl<M> TreeNode<M> {
    /// Creates a detached, childless node with a random v4 id.
    pub fn new(metadata: Option<M>) -> Self {
        Self::with_generator(&RandomIdGenerator, metadata)
    }

    /// Creates a detached, childless node with an id drawn from `generator`.
    pub fn with_generator<G: IdGenerator + ?Sized>(generator: &G, metadata: Option<M>) -> Self {
        Self {
            id: generator.generate(),
            parent_id: None,
            children: Vec::new(),
            metadata,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Recorded parent id.
    ///
    /// Not cleared when the node is removed from its parent; only
    /// overwritten when the node is attached somewhere else.
    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    pub fn children(&self) -> &[TreeNode<M>] {
        &self.children
    }

    pub fn metadata(&self) -> Option<&M> {
        self.metadata.as_ref()
    }

    pub fn metadata_mut(&mut self) -> Option<&mut M> {
        self.metadata.as_mut()
    }

    pub fn set_metadata(&mut self, metadata: Option<M>) -> Option<M> {
        std::mem::replace(&mut self.metadata, metadata)
    }

    pub fn take_metadata(&mut self) -> Option<M> {
        self.metadata.take()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Appends `child` as the last child and records this node as its parent.
    ///
    /// No validation is performed; see [`TreeNode::try_add_node`].
    #[instrument(level = "trace", skip(self, child), fields(parent = %self.id, child = %child.id))]
    pub fn add_node(&mut self, mut child: TreeNode<M>) {
        debug!("Attaching {} to {}", child.id, self.id);
        child.parent_id = Some(self.id);
        self.children.push(child);
    }

    /// Like [`TreeNode::add_node`], but rejects a child whose subtree shares an
    /// id with this subtree (or with itself).
    #[instrument(level = "trace", skip(self, child), fields(parent = %self.id, child = %child.id))]
    pub fn try_add_node(&mut self, child: TreeNode<M>) -> TreeResult<()> {
        self.check_disjoint(&child)?;
        self.add_node(child);
        Ok(())
    }

    /// Depth-first pre-order search, receiver first.
    #[instrument(level = "trace", skip(self))]
    pub fn get_node_by_id(&self, target: &NodeId) -> Option<&TreeNode<M>> {
        self.iter().find(|node| node.id == *target)
    }

    /// Mutable variant of [`TreeNode::get_node_by_id`], same visiting order.
    #[instrument(level = "trace", skip(self))]
    pub fn get_node_by_id_mut(&mut self, target: &NodeId) -> Option<&mut TreeNode<M>> {
        let mut stack: Vec<&mut TreeNode<M>> = vec![&mut *self];
        while let Some(node) = stack.pop() {
            if node.id == *target {
                return Some(node);
            }
            stack.extend(node.children.iter_mut().rev());
        }
        None
    }

    pub fn contains(&self, target: &NodeId) -> bool {
        self.get_node_by_id(target).is_some()
    }

    /// Detaches the node with `target` from somewhere below the receiver and
    /// hands the subtree back.
    ///
    /// Each visited node scans its direct children before the search descends,
    /// children left to right. The receiver itself is never a candidate. The
    /// detached node keeps its stale `parent_id`.
    #[instrument(level = "trace", skip(self))]
    pub fn take_node_by_id(&mut self, target: &NodeId) -> Option<TreeNode<M>> {
        let mut stack: Vec<&mut TreeNode<M>> = vec![&mut *self];
        while let Some(node) = stack.pop() {
            if let Some(pos) = node.children.iter().position(|c| c.id == *target) {
                debug!("Detaching {} from {}", target, node.id);
                return Some(node.children.remove(pos));
            }
            stack.extend(node.children.iter_mut().rev());
        }
        debug!("Node {} not found below {}", target, self.id);
        None
    }

    /// Removes the node with `target` (and its subtree) from below the receiver.
    pub fn remove_node_by_id(&mut self, target: &NodeId) -> bool {
        self.take_node_by_id(target).is_some()
    }

    /// Attaches `child` under the node with `target`.
    ///
    /// Returns false and drops `child` when the target is absent.
    #[instrument(level = "trace", skip(self, child))]
    pub fn add_node_to_node(&mut self, target: &NodeId, child: TreeNode<M>) -> bool {
        match self.get_node_by_id_mut(target) {
            Some(node) => {
                node.add_node(child);
                true
            }
            None => {
                debug!("Cannot attach {}: target {} not found", child.id, target);
                false
            }
        }
    }

    /// Hardened [`TreeNode::add_node_to_node`].
    ///
    /// Duplicate ids are checked against the receiver's whole subtree, so call
    /// it on the root to guard the entire tree.
    #[instrument(level = "trace", skip(self, child))]
    pub fn try_add_node_to_node(&mut self, target: &NodeId, child: TreeNode<M>) -> TreeResult<()> {
        if !self.contains(target) {
            return Err(TreeError::NodeNotFound(*target));
        }
        self.check_disjoint(&child)?;
        match self.get_node_by_id_mut(target) {
            Some(node) => {
                node.add_node(child);
                Ok(())
            }
            None => Err(TreeError::NodeNotFound(*target)),
        }
    }

    /// Applies `f` to the receiver and returns its result.
    pub fn run_custom_function<P, R, F>(&mut self, f: F, params: P) -> R
    where
        F: FnOnce(&mut TreeNode<M>, P) -> R,
    {
        f(self, params)
    }

    /// Applies `f` to the node with `target`; the callback's result is discarded.
    ///
    /// Returns false, without calling `f`, when the target is absent. Use
    /// [`TreeNode::get_node_by_id_mut`] plus [`TreeNode::run_custom_function`]
    /// when the result is needed.
    #[instrument(level = "trace", skip(self, f, params))]
    pub fn run_function_on_node<P, R, F>(&mut self, target: &NodeId, f: F, params: P) -> bool
    where
        F: FnOnce(&mut TreeNode<M>, P) -> R,
    {
        match self.get_node_by_id_mut(target) {
            Some(node) => {
                let _ = node.run_custom_function(f, params);
                true
            }
            None => false,
        }
    }

    /// Recorded parent id of the node with `target`.
    #[instrument(level = "trace", skip(self))]
    pub fn get_parent_node_id(&self, target: &NodeId) -> Option<NodeId> {
        self.get_node_by_id(target).and_then(|node| node.parent_id)
    }

    /// Pre-order fold: `acc = f(acc, node)` for every node of the subtree.
    pub fn traverse<A, F>(&self, f: F, init: A) -> A
    where
        F: FnMut(A, &TreeNode<M>) -> A,
    {
        self.iter().fold(init, f)
    }

    /// Pre-order iterator over the subtree, children left to right.
    pub fn iter(&self) -> TreeIterator<'_, M> {
        TreeIterator::new(self)
    }

    /// Post-order iterator over the subtree, children left to right.
    pub fn iter_postorder(&self) -> PostOrderIterator<'_, M> {
        PostOrderIterator::new(self)
    }

    /// Number of nodes in the subtree, receiver included.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Levels in the subtree; a leaf has depth 1.
    #[instrument(level = "trace", skip(self))]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            stack.extend(node.children.iter().map(|child| (child, depth + 1)));
        }
        max_depth
    }

    /// Ids of all childless nodes, in pre-order.
    pub fn leaf_nodes(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|node| node.is_leaf())
            .map(|node| node.id)
            .collect()
    }

    /// Chain of ids from the receiver down to `target`, both ends included.
    #[instrument(level = "trace", skip(self))]
    pub fn path_to(&self, target: &NodeId) -> Option<Vec<NodeId>> {
        let mut path: Vec<NodeId> = Vec::new();
        let mut stack = vec![(self, 0usize)];
        while let Some((node, level)) = stack.pop() {
            path.truncate(level);
            path.push(node.id);
            if node.id == *target {
                return Some(path);
            }
            stack.extend(node.children.iter().rev().map(|child| (child, level + 1)));
        }
        None
    }

    fn check_disjoint(&self, child: &TreeNode<M>) -> TreeResult<()> {
        let mut seen: HashSet<NodeId> = self.iter().map(|node| node.id).collect();
        for node in child.iter() {
            if !seen.insert(node.id) {
                debug!("Rejecting attach: duplicate id {}", node.id);
                return Err(TreeError::DuplicateId(node.id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::SequentialIdGenerator;
    use crate::util::testing::capture_logs;

    fn sample() -> (TreeNode<&'static str>, [NodeId; 5]) {
        //      root
        //     /    \
        //    a      d
        //   / \
        //  b   c
        let gen = SequentialIdGenerator::new(1);
        let mut root = TreeNode::with_generator(&gen, Some("root"));
        let mut a = TreeNode::with_generator(&gen, Some("a"));
        let b = TreeNode::with_generator(&gen, Some("b"));
        let c = TreeNode::with_generator(&gen, Some("c"));
        let d = TreeNode::with_generator(&gen, Some("d"));
        let ids = [root.id(), a.id(), b.id(), c.id(), d.id()];
        a.add_node(b);
        a.add_node(c);
        root.add_node(a);
        root.add_node(d);
        (root, ids)
    }

    #[test]
    fn given_new_node_then_detached_and_empty() {
        let node: TreeNode<u32> = TreeNode::new(None);
        assert!(node.parent_id().is_none());
        assert!(node.children().is_empty());
        assert!(node.metadata().is_none());
        assert!(node.is_leaf());
    }

    #[test]
    fn given_metadata_when_mutated_then_contents_change() {
        let mut node = TreeNode::new(Some(vec![1]));
        node.metadata_mut().unwrap().push(2);
        assert_eq!(node.metadata(), Some(&vec![1, 2]));
        assert_eq!(node.set_metadata(None), Some(vec![1, 2]));
        assert!(node.take_metadata().is_none());
    }

    #[test]
    fn given_child_when_added_then_attach_logged() {
        let mut root = TreeNode::new(Some("root"));
        let child = TreeNode::new(Some("child"));
        let (root_id, child_id) = (root.id(), child.id());

        let ((), logs) = capture_logs(|| root.add_node(child));

        assert!(logs.contains("DEBUG"));
        assert!(logs.contains(&format!("Attaching {child_id} to {root_id}")));
    }

    #[test]
    fn given_clone_then_ids_and_parents_preserved() {
        let (root, ids) = sample();
        let copy = root.clone();
        let copied: Vec<(NodeId, Option<NodeId>)> =
            copy.iter().map(|n| (n.id(), n.parent_id())).collect();
        let original: Vec<(NodeId, Option<NodeId>)> =
            root.iter().map(|n| (n.id(), n.parent_id())).collect();
        assert_eq!(copied, original);
        assert_eq!(copy.leaf_nodes(), vec![ids[2], ids[3], ids[4]]);
    }

    #[test]
    fn given_tree_when_iterating_then_preorder() {
        let (root, [r, a, b, c, d]) = sample();
        let order: Vec<NodeId> = root.iter().map(|n| n.id()).collect();
        assert_eq!(order, vec![r, a, b, c, d]);
    }

    #[test]
    fn given_tree_when_iterating_postorder_then_children_first() {
        let (root, [r, a, b, c, d]) = sample();
        let order: Vec<NodeId> = root.iter_postorder().map(|n| n.id()).collect();
        assert_eq!(order, vec![b, c, a, d, r]);
    }

    #[test]
    fn given_tree_when_querying_structure_then_counts_match() {
        let (root, [_, a, b, c, d]) = sample();
        assert_eq!(root.node_count(), 5);
        assert_eq!(root.depth(), 3);
        assert_eq!(root.leaf_nodes(), vec![b, c, d]);
        assert_eq!(root.get_node_by_id(&a).unwrap().depth(), 2);
    }

    #[test]
    fn given_tree_when_path_to_then_returns_chain() {
        let (root, [r, a, _, c, d]) = sample();
        assert_eq!(root.path_to(&c), Some(vec![r, a, c]));
        assert_eq!(root.path_to(&d), Some(vec![r, d]));
        assert_eq!(root.path_to(&r), Some(vec![r]));
        assert!(root.path_to(&RandomIdGenerator.generate()).is_none());
    }

    #[test]
    fn given_receiver_id_when_removing_then_false() {
        let (mut root, [r, ..]) = sample();
        assert!(!root.remove_node_by_id(&r));
        assert_eq!(root.node_count(), 5);
    }

    #[test]
    fn given_taken_node_then_keeps_stale_parent_id() {
        let (mut root, [_, a, b, ..]) = sample();
        let taken = root.take_node_by_id(&b).unwrap();
        assert_eq!(taken.parent_id(), Some(a));
        assert_eq!(root.node_count(), 4);
    }

    #[test]
    fn given_taken_node_when_reattached_then_parent_overwritten() {
        let (mut root, [_, a, b, _, d]) = sample();
        let taken = root.take_node_by_id(&b).unwrap();
        assert!(root.add_node_to_node(&d, taken));
        assert_eq!(root.get_parent_node_id(&b), Some(d));
        assert_ne!(root.get_parent_node_id(&b), Some(a));
    }

    #[test]
    fn given_cloned_subtree_when_try_add_then_duplicate_rejected() {
        let (mut root, [_, a, ..]) = sample();
        let copy = root.get_node_by_id(&a).unwrap().clone();
        let before = root.node_count();
        assert_eq!(root.try_add_node(copy), Err(TreeError::DuplicateId(a)));
        assert_eq!(root.node_count(), before);
    }

    #[test]
    fn given_fresh_child_when_try_add_to_node_then_attached() {
        let (mut root, [_, _, _, c, _]) = sample();
        let child = TreeNode::new(Some("e"));
        let e = child.id();
        assert!(root.try_add_node_to_node(&c, child).is_ok());
        assert_eq!(root.get_parent_node_id(&e), Some(c));
    }

    #[test]
    fn given_missing_target_when_try_add_to_node_then_not_found() {
        let (mut root, _) = sample();
        let missing = RandomIdGenerator.generate();
        let result = root.try_add_node_to_node(&missing, TreeNode::new(Some("e")));
        assert_eq!(result, Err(TreeError::NodeNotFound(missing)));
        assert_eq!(root.node_count(), 5);
    }
}
