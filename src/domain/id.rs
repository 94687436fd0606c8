//! Node identifiers and pluggable id generation

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::{Builder, Uuid, Variant};

use crate::errors::TreeError;

/// Opaque, process-unique node identifier.
///
/// Textual form is a hyphenated UUID v4 (`xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// True when the id carries the v4 version nibble and RFC 4122 variant bits.
    pub fn is_v4_layout(&self) -> bool {
        self.0.get_version_num() == 4 && self.0.get_variant() == Variant::RFC4122
    }
}

impl From<Uuid> for NodeId {
    fn from(uuid: Uuid) -> Self {
        NodeId(uuid)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for NodeId {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(NodeId)
            .map_err(|e| TreeError::InvalidId {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Strategy for minting node ids.
///
/// Implementations must be collision-free for the lifetime of a tree
/// population; they need not be cryptographically secure.
pub trait IdGenerator {
    fn generate(&self) -> NodeId;
}

/// Draws ids from the thread-local random source (`Uuid::new_v4`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> NodeId {
        NodeId(Uuid::new_v4())
    }
}

/// Deterministic generator for tests and reproducible trees.
///
/// The full seed and the low 58 bits of the counter are packed into the 122
/// bits a v4 UUID leaves free, so the version and variant stamps never
/// overwrite either of them. Distinct seeds give disjoint sequences; within
/// one seed ids repeat only after 2^58 draws.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    seed: u64,
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            counter: AtomicU64::new(0),
        }
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> NodeId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;
        let packed = (u128::from(self.seed) << COUNTER_BITS) | u128::from(n);
        let bytes = spread_over_free_bits(packed).to_be_bytes();
        NodeId(Builder::from_random_bytes(bytes).into_uuid())
    }
}

const COUNTER_BITS: u32 = 58;
const COUNTER_MASK: u64 = (1 << COUNTER_BITS) - 1;

/// Moves the low 122 bits of `packed` around the stamped positions of a v4
/// UUID: bits 62..64 (variant) and 76..80 (version), counted from the least
/// significant bit of the big-endian value.
fn spread_over_free_bits(packed: u128) -> u128 {
    let low = packed & ((1 << 62) - 1);
    let mid = (packed >> 62) & 0xFFF;
    let high = (packed >> 74) & ((1 << 48) - 1);
    low | (mid << 64) | (high << 80)
}

impl<G: IdGenerator + ?Sized> IdGenerator for &G {
    fn generate(&self) -> NodeId {
        (**self).generate()
    }
}

impl<G: IdGenerator + ?Sized> IdGenerator for Box<G> {
    fn generate(&self) -> NodeId {
        (**self).generate()
    }
}

impl<G: IdGenerator + ?Sized> IdGenerator for Arc<G> {
    fn generate(&self) -> NodeId {
        (**self).generate()
    }
}
