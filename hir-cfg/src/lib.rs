//! This crate provides the basic block abstraction of Miden's mutable, SSA-based IR, together with
//! the bookkeeping that keeps successor and predecessor edges consistent while passes rewrite the
//! control-flow graph of a [Function].
//!
//! All IR entities of a function ([Block], [Operation], [BlockArgument] and the [BlockOperand]
//! edge records) are allocated in arenas owned by that function, and referred to by small,
//! copyable handles ([BlockRef], [OperationRef], [BlockArgumentRef], [BlockOperandRef]). The
//! predecessor view of a block is an intrusive, doubly-linked list threaded through the edge
//! records that target it, so there is no separate adjacency structure that could fall out of
//! sync with the branch targets of the terminators.
#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub use compact_str::{
    CompactString as SmallStr, CompactStringExt as SmallStrExt, ToCompactString as ToSmallStr,
};
pub use miden_debug_types::SourceSpan;
pub use smallvec::{SmallVec, ToSmallVec, smallvec};

pub type FxHashMap<K, V> = hashbrown::HashMap<K, V, rustc_hash::FxBuildHasher>;
pub type FxHashSet<K> = hashbrown::HashSet<K, rustc_hash::FxBuildHasher>;
pub use rustc_hash::{FxBuildHasher, FxHasher};

pub mod adt;
mod ir;


pub use self::ir::*;
