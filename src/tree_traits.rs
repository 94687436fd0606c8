use std::fmt::Display;

use termtree::Tree;
use tracing::instrument;

use crate::config::RenderSettings;
use crate::domain::TreeNode;

const ELIDED: &str = "...";

pub trait TreeNodeConvert {
    fn to_tree_string(&self, settings: &RenderSettings) -> Tree<String>;
}

impl<M: Display> TreeNodeConvert for TreeNode<M> {
    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self, settings: &RenderSettings) -> Tree<String> {
        self.to_tree_string_with(settings, |node| match node.metadata() {
            Some(metadata) => metadata.to_string(),
            None => "-".to_string(),
        })
    }
}

impl<M> TreeNode<M> {
    /// Render the subtree with a caller-supplied label per node.
    pub fn to_tree_string_with<F>(&self, settings: &RenderSettings, label: F) -> Tree<String>
    where
        F: Fn(&TreeNode<M>) -> String,
    {
        build_tree(self, settings, &label)
    }
}

type Frame<'a, M> = (&'a TreeNode<M>, usize, usize, Tree<String>);

// Explicit stack of (node, level, next child, rendered so far); a finished
// frame is pushed onto its parent's leaves.
fn build_tree<M, F>(root: &TreeNode<M>, settings: &RenderSettings, label: &F) -> Tree<String>
where
    F: Fn(&TreeNode<M>) -> String,
{
    let limit = settings.effective_max_depth();
    let open = |node: &TreeNode<M>, level: usize| -> (usize, Tree<String>) {
        let text = if settings.show_ids {
            format!("{} [{}]", label(node), node.id())
        } else {
            label(node)
        };
        let mut tree = Tree::new(text);
        if !node.is_leaf() && level >= limit {
            tree.push(Tree::new(ELIDED.to_string()));
            return (node.children().len(), tree);
        }
        (0, tree)
    };

    let (next, tree) = open(root, 0);
    let mut stack: Vec<Frame<'_, M>> = vec![(root, 0, next, tree)];
    loop {
        let top = stack.len() - 1;
        let (node, level, next) = (stack[top].0, stack[top].1, stack[top].2);
        if let Some(child) = node.children().get(next) {
            stack[top].2 += 1;
            let (child_next, child_tree) = open(child, level + 1);
            stack.push((child, level + 1, child_next, child_tree));
            continue;
        }
        let (_, _, _, tree) = stack.swap_remove(top);
        match stack.last_mut() {
            Some(parent) => {
                parent.3.push(tree);
            }
            None => return tree,
        }
    }
}
