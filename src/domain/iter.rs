use crate::domain::node::TreeNode;

/// Pre-order walk over a subtree using an explicit stack.
pub struct TreeIterator<'a, M> {
    stack: Vec<&'a TreeNode<M>>,
}

impl<'a, M> TreeIterator<'a, M> {
    pub(crate) fn new(root: &'a TreeNode<M>) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a, M> Iterator for TreeIterator<'a, M> {
    type Item = &'a TreeNode<M>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        // Push children in reverse order for left-to-right traversal
        self.stack.extend(current.children().iter().rev());
        Some(current)
    }
}

/// Post-order walk over a subtree; each node is yielded after all its children.
pub struct PostOrderIterator<'a, M> {
    stack: Vec<(&'a TreeNode<M>, bool)>,
}

impl<'a, M> PostOrderIterator<'a, M> {
    pub(crate) fn new(root: &'a TreeNode<M>) -> Self {
        Self {
            stack: vec![(root, false)],
        }
    }
}

impl<'a, M> Iterator for PostOrderIterator<'a, M> {
    type Item = &'a TreeNode<M>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current, visited)) = self.stack.pop() {
            if visited {
                return Some(current);
            }
            self.stack.push((current, true));
            for child in current.children().iter().rev() {
                self.stack.push((child, false));
            }
        }
        None
    }
}
