use std::io;
use std::sync::{Arc, Mutex, Once};

use tracing::{debug, info, Level};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    prelude::*,
    EnvFilter,
};

use crate::domain::{NodeId, SequentialIdGenerator, TreeNode};

static TEST_SETUP: Once = Once::new();

/// Install a stderr tracing subscriber once per test binary.
///
/// Honours `RUST_LOG`, defaulting to `nodetree=debug`.
pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}=debug", env!("CARGO_CRATE_NAME"))));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter),
    );

    // Only set if we haven't already set a global subscriber
    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else if let Err(e) = subscriber.try_init() {
        eprintln!("Error: Failed to set up logging: {}", e);
    }
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("log buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` under a thread-local subscriber and return what it logged at
/// `DEBUG` and above, without ANSI colours.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.0.lock().map(|b| b.clone()).unwrap_or_default();
    (result, String::from_utf8_lossy(&bytes).into_owned())
}

/// Build a tree from `(label, parent_label)` pairs with deterministic ids.
///
/// The first pair is the root (its parent is ignored); every other parent
/// must appear earlier in the list. Unknown parents are skipped.
pub fn build_labelled_tree(
    seed: u64,
    pairs: &[(&'static str, &'static str)],
) -> TreeNode<&'static str> {
    let gen = SequentialIdGenerator::new(seed);
    let mut nodes = pairs.iter();
    let (root_label, _) = nodes.next().copied().unwrap_or(("root", ""));
    let mut root = TreeNode::with_generator(&gen, Some(root_label));
    for &(label, parent) in nodes {
        let parent_id = root
            .iter()
            .find(|node| node.metadata() == Some(&parent))
            .map(|node| node.id());
        if let Some(parent_id) = parent_id {
            root.add_node_to_node(&parent_id, TreeNode::with_generator(&gen, Some(label)));
        }
    }
    debug!("Built labelled tree with {} ids", gen.issued());
    root
}

/// Id of the first node (pre-order) carrying `label`.
pub fn id_of(root: &TreeNode<&'static str>, label: &str) -> Option<NodeId> {
    root.iter()
        .find(|node| node.metadata().is_some_and(|m| *m == label))
        .map(|node| node.id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_setup() {
        init_test_setup();
        init_test_setup();
    }

    #[test]
    fn given_debug_event_when_captured_then_returned_as_text() {
        let (value, logs) = capture_logs(|| {
            debug!("captured {}", 7);
            7
        });
        assert_eq!(value, 7);
        assert!(logs.contains("captured 7"));
    }

    #[test]
    fn given_pairs_when_building_then_structure_matches() {
        let root = build_labelled_tree(1, &[("r", ""), ("a", "r"), ("b", "a"), ("c", "r")]);
        assert_eq!(root.node_count(), 4);
        let a = id_of(&root, "a").unwrap();
        let b = id_of(&root, "b").unwrap();
        assert_eq!(root.get_parent_node_id(&b), Some(a));
    }
}
