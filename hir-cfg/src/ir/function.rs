use core::{fmt, iter::FusedIterator};

use super::{entity::Entity, *};
use crate::{SmallStr, adt::Arena};

/// The arenas from which all IR entities of a [Function] are allocated
#[derive(Default)]
pub(crate) struct Storage {
    pub blocks: Arena<BlockRef, Block>,
    pub ops: Arena<OperationRef, Operation>,
    pub arguments: Arena<BlockArgumentRef, BlockArgument>,
    pub edges: Arena<BlockOperandRef, BlockOperand>,
}

/// A [Function] is the unit of mutation for the IR: it owns every block of its control-flow
/// graph, along with the operations, arguments and edge records of those blocks.
///
/// Blocks are kept in a layout order, the first block of which is the entry block. A block can be
/// removed from the layout without being destroyed, and inserted again later, e.g. to reorder it.
pub struct Function {
    pub(super) id: FunctionId,
    pub(super) name: SmallStr,
    pub(super) storage: Storage,
    first_block: Option<BlockRef>,
    last_block: Option<BlockRef>,
    num_blocks: usize,
}

impl Function {
    /// Create a new, empty function called `name`
    pub fn new(name: impl Into<SmallStr>) -> Self {
        Self {
            id: FunctionId::next(),
            name: name.into(),
            storage: Storage::default(),
            first_block: None,
            last_block: None,
            num_blocks: 0,
        }
    }

    #[inline(always)]
    pub const fn id(&self) -> FunctionId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Allocate `entity` in the storage of this function
    pub(crate) fn allocate<T: Entity>(&mut self, entity: T) -> T::Ref {
        T::arena_mut(&mut self.storage).alloc(entity)
    }

    /// Get the entity identified by `entity`, panicking if it has been released
    #[track_caller]
    pub(crate) fn get<T: Entity>(&self, entity: T::Ref) -> &T {
        &T::arena(&self.storage)[entity]
    }

    /// Take `entity` out of the storage of this function. Its handle is dead from here on.
    #[track_caller]
    pub(crate) fn release<T: Entity>(&mut self, entity: T::Ref) -> T {
        T::arena_mut(&mut self.storage).release(entity)
    }

    /// Returns true if `block` refers to a live block of this function
    pub fn contains_block(&self, block: BlockRef) -> bool {
        self.storage.blocks.contains(block)
    }

    /// Returns true if `op` refers to a live operation of this function
    pub fn contains_op(&self, op: OperationRef) -> bool {
        self.storage.ops.contains(op)
    }

    /// Returns true if `arg` refers to a live block argument of this function
    pub fn contains_argument(&self, arg: BlockArgumentRef) -> bool {
        self.storage.arguments.contains(arg)
    }

    /// Returns true if `edge` refers to a live edge record of this function
    pub fn contains_edge(&self, edge: BlockOperandRef) -> bool {
        self.storage.edges.contains(edge)
    }

    /// The number of live edge records in this function
    pub fn num_edges(&self) -> usize {
        self.storage.edges.len()
    }
}

/// Layout
impl Function {
    /// The entry block of this function, i.e. the first block in its layout
    #[inline]
    pub fn entry_block(&self) -> Option<BlockRef> {
        self.first_block
    }

    /// The last block in the layout of this function
    #[inline]
    pub fn last_block(&self) -> Option<BlockRef> {
        self.last_block
    }

    /// The number of blocks in the layout of this function
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    /// Iterate over the blocks of this function in layout order
    pub fn blocks(&self) -> BlockIter<'_> {
        BlockIter {
            function: self,
            front: self.first_block,
            back: self.last_block,
            remaining: self.num_blocks,
        }
    }

    /// The block following `block` in the layout, if any
    #[track_caller]
    pub fn next_block(&self, block: BlockRef) -> Option<BlockRef> {
        self.block(block).next
    }

    /// The block preceding `block` in the layout, if any
    #[track_caller]
    pub fn prev_block(&self, block: BlockRef) -> Option<BlockRef> {
        self.block(block).prev
    }

    /// The position of `block` in the layout, starting at 0 for the entry block
    ///
    /// # Panics
    ///
    /// Panics if `block` is not in the layout.
    #[track_caller]
    pub fn block_position(&self, block: BlockRef) -> usize {
        assert!(self.block(block).linked, "{block} is not in the layout of @{}", self.name);
        let mut position = 0;
        let mut cursor = self.block(block).prev;
        while let Some(prev) = cursor {
            position += 1;
            cursor = self.block(prev).prev;
        }
        position
    }

    /// Create a new block and append it to the layout
    pub fn create_block(&mut self) -> BlockRef {
        let block = self.create_detached_block();
        self.append_block(block);
        block
    }

    /// Create a new block which is not yet in the layout
    pub fn create_detached_block(&mut self) -> BlockRef {
        let block = self.allocate(Block::new(self.id));
        log::trace!(target: "cfg", "created {block} in @{}", self.name);
        block
    }

    /// Append `block` to the layout
    #[track_caller]
    pub fn append_block(&mut self, block: BlockRef) {
        let after = self.last_block;
        self.link_block(block, after);
    }

    /// Insert `block` in the layout immediately after `after`
    #[track_caller]
    pub fn insert_block_after(&mut self, block: BlockRef, after: BlockRef) {
        assert!(self.block(after).linked, "cannot insert {block} after {after}: it is not in the layout");
        self.link_block(block, Some(after));
    }

    /// Insert `block` in the layout immediately before `before`
    #[track_caller]
    pub fn insert_block_before(&mut self, block: BlockRef, before: BlockRef) {
        assert!(
            self.block(before).linked,
            "cannot insert {block} before {before}: it is not in the layout"
        );
        let after = self.block(before).prev;
        self.link_block(block, after);
    }

    /// Remove `block` from the layout, without destroying it.
    ///
    /// The block keeps its operations, arguments and edges, and can be inserted again.
    #[track_caller]
    pub fn remove_block(&mut self, block: BlockRef) {
        assert!(self.block(block).linked, "cannot remove {block}: it is not in the layout");
        let (prev, next) = {
            let data = self.block_mut(block);
            data.linked = false;
            (data.prev.take(), data.next.take())
        };
        match prev {
            Some(prev) => self.block_mut(prev).next = next,
            None => self.first_block = next,
        }
        match next {
            Some(next) => self.block_mut(next).prev = prev,
            None => self.last_block = prev,
        }
        self.num_blocks -= 1;
        log::trace!(target: "cfg", "removed {block} from the layout of @{}", self.name);
    }

    /// Erase `block` and everything it owns.
    ///
    /// The block is removed from the layout (if present), its operations are erased, which
    /// destroys the edge records of its terminator, and its arguments are released.
    ///
    /// # Panics
    ///
    /// Panics if any block other than `block` itself still branches to `block`.
    #[track_caller]
    pub fn erase_block(&mut self, block: BlockRef) {
        let external_preds = self
            .predecessor_edges(block)
            .filter(|edge| self.edge_source(*edge) != block)
            .count();
        assert_eq!(
            external_preds, 0,
            "cannot erase {block}: it is still the destination of {external_preds} edge(s)"
        );

        log::debug!(target: "cfg", "erasing {block} from @{}", self.name);
        if self.block(block).linked {
            self.remove_block(block);
        }
        while let Some(op) = self.block(block).last_op {
            self.erase_op(op);
        }
        self.drop_all_arguments(block);
        debug_assert!(!self.block(block).has_predecessors());
        self.release::<Block>(block);
    }

    /// Link the detached `block` into the layout after `after`, or at the front if `None`
    #[track_caller]
    fn link_block(&mut self, block: BlockRef, after: Option<BlockRef>) {
        assert!(!self.block(block).linked, "cannot insert {block}: it is already in the layout");
        let next = match after {
            Some(after) => self.block(after).next,
            None => self.first_block,
        };
        {
            let data = self.block_mut(block);
            data.linked = true;
            data.prev = after;
            data.next = next;
        }
        match after {
            Some(after) => self.block_mut(after).next = Some(block),
            None => self.first_block = Some(block),
        }
        match next {
            Some(next) => self.block_mut(next).prev = Some(block),
            None => self.last_block = Some(block),
        }
        self.num_blocks += 1;
        log::trace!(target: "cfg", "inserted {block} in the layout of @{}", self.name);
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("blocks", &self.storage.blocks)
            .field("ops", &self.storage.ops)
            .field("arguments", &self.storage.arguments)
            .field("edges", &self.storage.edges)
            .finish()
    }
}

/// A double-ended iterator over the blocks of a [Function], in layout order
#[doc(hidden)]
pub struct BlockIter<'a> {
    function: &'a Function,
    front: Option<BlockRef>,
    back: Option<BlockRef>,
    remaining: usize,
}

impl Iterator for BlockIter<'_> {
    type Item = BlockRef;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let block = self.front?;
        self.remaining -= 1;
        self.front = self.function.block(block).next;
        Some(block)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for BlockIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let block = self.back?;
        self.remaining -= 1;
        self.back = self.function.block(block).prev;
        Some(block)
    }
}

impl ExactSizeIterator for BlockIter<'_> {}
impl FusedIterator for BlockIter<'_> {}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::SourceSpan;

    #[test]
    fn block_layout() {
        let mut function = Function::new("test");
        assert_eq!(function.entry_block(), None);

        let a = function.create_block();
        let c = function.create_block();
        let b = function.create_detached_block();
        assert!(!function.block(b).is_linked());
        assert_eq!(function.num_blocks(), 2);

        function.insert_block_after(b, a);
        let d = function.create_detached_block();
        function.insert_block_before(d, a);

        assert_eq!(function.blocks().collect::<Vec<_>>(), [d, a, b, c]);
        assert_eq!(function.blocks().rev().collect::<Vec<_>>(), [c, b, a, d]);
        assert_eq!(function.entry_block(), Some(d));
        assert_eq!(function.last_block(), Some(c));
        assert!(function.is_entry_block(d));
        assert_eq!(function.block_position(b), 2);
        assert_eq!(function.next_block(b), Some(c));
        assert_eq!(function.prev_block(a), Some(d));
        assert_eq!(function.num_blocks(), 4);
    }

    #[test]
    fn remove_and_reinsert_block() {
        let mut function = Function::new("test");
        let a = function.create_block();
        let b = function.create_block();
        let c = function.create_block();
        function.insert_op(OperationState::br(c), ProgramPoint::End(b));

        function.remove_block(b);
        assert_eq!(function.blocks().collect::<Vec<_>>(), [a, c]);
        // Removal keeps the block, and its edges, alive
        assert!(function.contains_block(b));
        assert_eq!(function.predecessors(c).collect::<Vec<_>>(), [b]);

        function.append_block(b);
        assert_eq!(function.blocks().collect::<Vec<_>>(), [a, c, b]);
        assert_eq!(function.block_position(b), 2);
    }

    #[test]
    fn erase_block_cascade() {
        let mut function = Function::new("test");
        let entry = function.create_block();
        let body = function.create_block();
        let exit = function.create_block();
        function.insert_op(OperationState::br(exit), ProgramPoint::End(entry));

        let args = [
            function.add_argument(body, SourceSpan::UNKNOWN),
            function.add_argument(body, SourceSpan::UNKNOWN),
        ];
        let op = function.insert_op(OperationState::new("test.op"), ProgramPoint::End(body));
        let cond_br = function.insert_op(OperationState::cond_br(exit, body), ProgramPoint::End(body));
        let edges = function.op(cond_br).successors().to_vec();
        assert_eq!(function.num_edges(), 3);

        function.erase_block(body);

        assert!(!function.contains_block(body));
        assert!(!function.contains_op(op));
        assert!(!function.contains_op(cond_br));
        assert!(args.iter().all(|arg| !function.contains_argument(*arg)));
        assert!(edges.iter().all(|edge| !function.contains_edge(*edge)));
        assert_eq!(function.predecessors(exit).collect::<Vec<_>>(), [entry]);
        assert_eq!(function.blocks().collect::<Vec<_>>(), [entry, exit]);
        assert_eq!(function.num_edges(), 1);
        function.verify_cfg_links().expect("links should be consistent");
    }

    #[test]
    fn erase_detached_block() {
        let mut function = Function::new("test");
        let entry = function.create_block();
        let block = function.create_detached_block();
        function.insert_op(OperationState::ret(), ProgramPoint::End(block));

        function.erase_block(block);

        assert!(!function.contains_block(block));
        assert_eq!(function.blocks().collect::<Vec<_>>(), [entry]);
    }

    #[test]
    #[should_panic(expected = "it is still the destination of 1 edge(s)")]
    fn erase_branch_target() {
        let mut function = Function::new("test");
        let entry = function.create_block();
        let exit = function.create_block();
        function.insert_op(OperationState::br(exit), ProgramPoint::End(entry));
        function.erase_block(exit);
    }

    #[test]
    #[should_panic(expected = "entity was released")]
    fn use_erased_block() {
        let mut function = Function::new("test");
        let block = function.create_block();
        function.erase_block(block);
        function.ops(block);
    }

    #[test]
    #[should_panic(expected = "it is already in the layout")]
    fn append_linked_block() {
        let mut function = Function::new("test");
        let block = function.create_block();
        function.append_block(block);
    }
}
