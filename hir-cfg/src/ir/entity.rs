use core::sync::atomic::{AtomicU32, Ordering};

use cranelift_entity::entity_impl;

use super::{Block, BlockArgument, BlockOperand, Operation, function::Storage};
use crate::adt::Arena;

/// A handle to a [Block] in the arena of its containing function
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockRef(u32);
entity_impl!(BlockRef, "block");

/// A handle to an [Operation] in the arena of its containing function
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationRef(u32);
entity_impl!(OperationRef, "op");

/// A handle to a [BlockArgument] in the arena of its containing function
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockArgumentRef(u32);
entity_impl!(BlockArgumentRef, "v");

/// A handle to a [BlockOperand], i.e. the edge record of a single control-flow edge
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockOperandRef(u32);
entity_impl!(BlockOperandRef, "edge");

/// The unique identity of a [super::Function].
///
/// Every block records the id of the function that allocated it.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(u32);
entity_impl!(FunctionId, "function");

impl FunctionId {
    pub(super) fn next() -> Self {
        static NEXT_ID: AtomicU32 = AtomicU32::new(0);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An [Entity] is an IR object whose storage is drawn from the arenas of a function.
///
/// This is what backs [super::Function::allocate] and [super::Function::release], so that all
/// entity storage flows through the function, and nothing is deallocated piecemeal.
pub(crate) trait Entity: Sized {
    /// The handle type used to refer to this entity
    type Ref: cranelift_entity::EntityRef;

    fn arena(storage: &Storage) -> &Arena<Self::Ref, Self>;
    fn arena_mut(storage: &mut Storage) -> &mut Arena<Self::Ref, Self>;
}

macro_rules! impl_entity {
    ($entity:ident, $handle:ident, $field:ident) => {
        impl Entity for $entity {
            type Ref = $handle;

            #[inline(always)]
            fn arena(storage: &Storage) -> &Arena<Self::Ref, Self> {
                &storage.$field
            }

            #[inline(always)]
            fn arena_mut(storage: &mut Storage) -> &mut Arena<Self::Ref, Self> {
                &mut storage.$field
            }
        }
    };
}

impl_entity!(Block, BlockRef, blocks);
impl_entity!(Operation, OperationRef, ops);
impl_entity!(BlockArgument, BlockArgumentRef, arguments);
impl_entity!(BlockOperand, BlockOperandRef, edges);
