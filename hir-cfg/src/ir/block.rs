use alloc::vec::Vec;
use core::{fmt, iter::FusedIterator};

use super::*;
use crate::SourceSpan;

/// A [Block] represents a basic block in the control-flow graph of a [Function].
///
/// A block owns an ordered list of operations, the last of which, once the block is fully
/// constructed, is its terminator, and an ordered list of [BlockArgument]s. Its successors are the
/// destinations of the edge records owned by its terminator, and its predecessors are found by
/// walking the list of edge records that target it.
///
/// Blocks are always allocated by, and belong to, a single [Function]. All queries and edits of a
/// block go through that function, using the block's [BlockRef] handle.
pub struct Block {
    /// The function which allocated this block
    pub(super) parent: FunctionId,
    /// Whether or not this block is currently part of the function layout
    pub(super) linked: bool,
    pub(super) prev: Option<BlockRef>,
    pub(super) next: Option<BlockRef>,
    pub(super) first_op: Option<OperationRef>,
    pub(super) last_op: Option<OperationRef>,
    pub(super) num_ops: usize,
    pub(super) arguments: Vec<BlockArgumentRef>,
    /// The head of the list of edge records targeting this block
    pub(super) first_pred: Option<BlockOperandRef>,
    /// The tail of the list of edge records targeting this block
    pub(super) last_pred: Option<BlockOperandRef>,
    pub(super) num_preds: usize,
}

impl Block {
    pub(super) fn new(parent: FunctionId) -> Self {
        Self {
            parent,
            linked: false,
            prev: None,
            next: None,
            first_op: None,
            last_op: None,
            num_ops: 0,
            arguments: Vec::new(),
            first_pred: None,
            last_pred: None,
            num_preds: 0,
        }
    }

    /// The id of the function this block belongs to
    #[inline(always)]
    pub const fn parent(&self) -> FunctionId {
        self.parent
    }

    /// Returns true if this block is currently part of the layout of its function
    #[inline(always)]
    pub const fn is_linked(&self) -> bool {
        self.linked
    }

    /// The first operation in this block, if any
    #[inline(always)]
    pub const fn front(&self) -> Option<OperationRef> {
        self.first_op
    }

    /// The last operation in this block, if any
    #[inline(always)]
    pub const fn back(&self) -> Option<OperationRef> {
        self.last_op
    }

    /// Returns true if this block has no operations
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.first_op.is_none()
    }

    #[inline(always)]
    pub const fn num_ops(&self) -> usize {
        self.num_ops
    }

    #[inline]
    pub fn has_arguments(&self) -> bool {
        !self.arguments.is_empty()
    }

    #[inline]
    pub fn num_arguments(&self) -> usize {
        self.arguments.len()
    }

    /// Returns true if any edge targets this block
    #[inline]
    pub const fn has_predecessors(&self) -> bool {
        self.first_pred.is_some()
    }

    /// The number of edges targeting this block. Two edges from the same block count twice.
    #[inline(always)]
    pub const fn num_predecessors(&self) -> usize {
        self.num_preds
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("parent", &self.parent)
            .field("linked", &self.linked)
            .field("num_ops", &self.num_ops)
            .field("arguments", &self.arguments)
            .field("num_predecessors", &self.num_preds)
            .finish_non_exhaustive()
    }
}

/// Blocks
impl Function {
    /// Get the block identified by `block`
    ///
    /// # Panics
    ///
    /// Panics if `block` has been erased.
    #[track_caller]
    pub fn block(&self, block: BlockRef) -> &Block {
        self.get::<Block>(block)
    }

    #[track_caller]
    pub(super) fn block_mut(&mut self, block: BlockRef) -> &mut Block {
        &mut self.storage.blocks[block]
    }

    /// Returns true if `block` is the first block in the layout of this function
    pub fn is_entry_block(&self, block: BlockRef) -> bool {
        self.entry_block() == Some(block)
    }

    /// Iterate over the operations of `block`, in order
    #[track_caller]
    pub fn ops(&self, block: BlockRef) -> BlockOpIter<'_> {
        let data = self.block(block);
        BlockOpIter {
            function: self,
            front: data.first_op,
            back: data.last_op,
            remaining: data.num_ops,
        }
    }

    /// Returns true if the last operation of `block` is a terminator
    pub fn has_terminator(&self, block: BlockRef) -> bool {
        self.block(block).last_op.is_some_and(|op| self.op(op).is_terminator())
    }

    /// Get the terminator of `block`
    ///
    /// # Panics
    ///
    /// Panics if `block` is empty, or its last operation is not a terminator. Both only happen
    /// while a block is under construction, e.g. after [Function::split_block].
    #[track_caller]
    pub fn terminator(&self, block: BlockRef) -> OperationRef {
        let Some(op) = self.block(block).last_op else {
            panic!("invalid terminator request: {block} is empty");
        };
        assert!(
            self.op(op).is_terminator(),
            "invalid terminator request: {block} ends with {op} ({}), which is not a terminator",
            self.op(op).name()
        );
        op
    }

    /// The edge records of the terminator of `block`, in successor order
    ///
    /// # Panics
    ///
    /// Panics if `block` has no terminator, see [Function::terminator].
    #[track_caller]
    pub fn successors(&self, block: BlockRef) -> &[BlockOperandRef] {
        self.op(self.terminator(block)).successors()
    }

    /// The destinations of the successor edges of `block`, in successor order
    #[track_caller]
    pub fn successor_blocks(&self, block: BlockRef) -> SuccessorIter<'_> {
        SuccessorIter {
            function: self,
            iter: self.successors(block).iter(),
        }
    }

    #[track_caller]
    pub fn num_successors(&self, block: BlockRef) -> usize {
        self.successors(block).len()
    }

    #[track_caller]
    pub fn has_successors(&self, block: BlockRef) -> bool {
        !self.successors(block).is_empty()
    }

    /// Iterate over the edge records targeting `block`
    #[track_caller]
    pub fn predecessor_edges(&self, block: BlockRef) -> PredecessorEdgeIter<'_> {
        let data = self.block(block);
        PredecessorEdgeIter {
            function: self,
            next: data.first_pred,
            remaining: data.num_preds,
        }
    }

    /// Iterate over the blocks containing an edge to `block`.
    ///
    /// A block appears once per edge, so a block which branches to `block` from two successors of
    /// its terminator is visited twice.
    #[track_caller]
    pub fn predecessors(&self, block: BlockRef) -> PredecessorIter<'_> {
        PredecessorIter {
            edges: self.predecessor_edges(block),
        }
    }

    /// If `block` has exactly one predecessor edge, get the block it originates from.
    ///
    /// NOTE: This counts edges, not blocks. If `block` is the destination of two edges from the
    /// same block, this returns `None`. See [Function::get_unique_predecessor].
    pub fn get_single_predecessor(&self, block: BlockRef) -> Option<BlockRef> {
        let data = self.block(block);
        match (data.first_pred, data.last_pred) {
            (Some(head), Some(tail)) if head == tail => Some(self.edge_source(head)),
            _ => None,
        }
    }

    /// If all predecessor edges of `block` originate from the same block, get that block.
    pub fn get_unique_predecessor(&self, block: BlockRef) -> Option<BlockRef> {
        let mut preds = self.predecessors(block);
        let first = preds.next()?;
        preds.all(|pred| pred == first).then_some(first)
    }

    /// If `block` has exactly one successor edge, get its destination.
    ///
    /// NOTE: Like [Function::get_single_predecessor], this counts edges, so a conditional branch
    /// to the same block on both arms returns `None`.
    #[track_caller]
    pub fn get_single_successor(&self, block: BlockRef) -> Option<BlockRef> {
        match self.successors(block) {
            [edge] => Some(self.edge(*edge).block),
            _ => None,
        }
    }

    /// Split `block` in two at `before`.
    ///
    /// A new block is inserted immediately after `block` in the function layout, and `before`,
    /// along with every operation following it, is moved to the new block. The arguments of
    /// `block` are untouched, and the new block has none.
    ///
    /// This leaves `block` without a terminator: it is up to the caller to insert one before
    /// handing the function over to anything else. See [Function::split_block_and_branch].
    ///
    /// # Panics
    ///
    /// Panics if `before` is not an operation of `block`.
    #[track_caller]
    pub fn split_block(&mut self, block: BlockRef, before: OperationRef) -> BlockRef {
        assert_eq!(
            self.op(before).block,
            block,
            "cannot split {block} at {before}: the operation does not belong to the block being split"
        );

        let new_block = self.allocate(Block::new(self.id));
        self.insert_block_after(new_block, block);

        // Detach the tail of the op list, starting at `before`
        let prev = self.storage.ops[before].prev.take();
        let last = self.block(block).last_op;
        match prev {
            Some(prev) => self.storage.ops[prev].next = None,
            None => self.block_mut(block).first_op = None,
        }
        self.block_mut(block).last_op = prev;

        // Reparent the detached ops
        let mut moved = 0;
        let mut cursor = Some(before);
        while let Some(op) = cursor {
            let op = &mut self.storage.ops[op];
            op.block = new_block;
            cursor = op.next;
            moved += 1;
        }
        self.block_mut(block).num_ops -= moved;
        {
            let data = self.block_mut(new_block);
            data.first_op = Some(before);
            data.last_op = last;
            data.num_ops = moved;
        }

        log::trace!(target: "cfg", "split {block} at {before}, moving {moved} ops to {new_block}");
        new_block
    }

    /// Split `block` in two at `before`, and terminate `block` with an unconditional branch to the
    /// newly-created block, whose location is `span`.
    ///
    /// Unlike [Function::split_block], `block` is left well-formed.
    #[track_caller]
    pub fn split_block_and_branch(
        &mut self,
        block: BlockRef,
        before: OperationRef,
        span: SourceSpan,
    ) -> BlockRef {
        let new_block = self.split_block(block, before);
        self.insert_op(OperationState::br(new_block).with_span(span), ProgramPoint::End(block));
        new_block
    }

    /// The block containing the terminator which owns `edge`
    #[inline]
    pub(super) fn edge_source(&self, edge: BlockOperandRef) -> BlockRef {
        self.op(self.edge(edge).owner).block
    }
}

/// A double-ended iterator over the operations of a block
#[doc(hidden)]
pub struct BlockOpIter<'a> {
    function: &'a Function,
    front: Option<OperationRef>,
    back: Option<OperationRef>,
    remaining: usize,
}

impl Iterator for BlockOpIter<'_> {
    type Item = OperationRef;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let op = self.front?;
        self.remaining -= 1;
        self.front = self.function.op(op).next;
        Some(op)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for BlockOpIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let op = self.back?;
        self.remaining -= 1;
        self.back = self.function.op(op).prev;
        Some(op)
    }
}

impl ExactSizeIterator for BlockOpIter<'_> {}
impl FusedIterator for BlockOpIter<'_> {}

/// An iterator over the destination blocks of the successor edges of a block
#[doc(hidden)]
pub struct SuccessorIter<'a> {
    function: &'a Function,
    iter: core::slice::Iter<'a, BlockOperandRef>,
}

impl Iterator for SuccessorIter<'_> {
    type Item = BlockRef;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|edge| self.function.edge(*edge).block)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl DoubleEndedIterator for SuccessorIter<'_> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.iter.next_back().map(|edge| self.function.edge(*edge).block)
    }
}

impl ExactSizeIterator for SuccessorIter<'_> {}
impl FusedIterator for SuccessorIter<'_> {}

/// A lazy iterator over the edge records targeting a block.
///
/// The iterator is cheap to clone, and cloning it before consuming it is how it gets restarted.
#[doc(hidden)]
#[derive(Clone)]
pub struct PredecessorEdgeIter<'a> {
    function: &'a Function,
    next: Option<BlockOperandRef>,
    remaining: usize,
}

impl Iterator for PredecessorEdgeIter<'_> {
    type Item = BlockOperandRef;

    fn next(&mut self) -> Option<Self::Item> {
        let edge = self.next?;
        self.next = self.function.edge(edge).next;
        self.remaining -= 1;
        Some(edge)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for PredecessorEdgeIter<'_> {}
impl FusedIterator for PredecessorEdgeIter<'_> {}

/// A lazy iterator over the source blocks of the edges targeting a block
#[doc(hidden)]
#[derive(Clone)]
pub struct PredecessorIter<'a> {
    edges: PredecessorEdgeIter<'a>,
}

impl Iterator for PredecessorIter<'_> {
    type Item = BlockRef;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let edge = self.edges.next()?;
        Some(self.edges.function.edge_source(edge))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.edges.size_hint()
    }
}

impl ExactSizeIterator for PredecessorIter<'_> {}
impl FusedIterator for PredecessorIter<'_> {}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use pretty_assertions::assert_eq;

    use super::*;

    /// Build a block containing `[a, b, c, d]`, where `d` is a branch to `exit`
    fn straight_line_block(function: &mut Function) -> (BlockRef, [OperationRef; 4], BlockRef) {
        let block = function.create_block();
        let exit = function.create_block();
        function.insert_op(OperationState::ret(), ProgramPoint::End(exit));

        let a = function.insert_op(OperationState::new("test.a"), ProgramPoint::End(block));
        let b = function.insert_op(OperationState::new("test.b"), ProgramPoint::End(block));
        let c = function.insert_op(OperationState::new("test.c"), ProgramPoint::End(block));
        let d = function.insert_op(OperationState::br(exit), ProgramPoint::End(block));
        (block, [a, b, c, d], exit)
    }

    #[test]
    fn terminator_is_last_op() {
        let mut function = Function::new("test");
        let (block, [.., d], exit) = straight_line_block(&mut function);

        assert!(function.has_terminator(block));
        assert_eq!(function.terminator(block), d);
        assert_eq!(function.get_single_successor(block), Some(exit));
        assert_eq!(function.get_single_predecessor(exit), Some(block));
        assert!(!function.has_successors(exit));
        assert_eq!(function.num_successors(exit), 0);
    }

    #[test]
    fn split_block_moves_tail() {
        let mut function = Function::new("test");
        let (block, [a, b, c, d], exit) = straight_line_block(&mut function);
        let arg = function.add_argument(block, SourceSpan::UNKNOWN);

        let new_block = function.split_block(block, c);

        assert_eq!(function.ops(block).collect::<Vec<_>>(), [a, b]);
        assert_eq!(function.ops(new_block).collect::<Vec<_>>(), [c, d]);
        assert!(!function.has_terminator(block));
        assert_eq!(function.terminator(new_block), d);
        assert_eq!(function.next_block(block), Some(new_block));
        assert_eq!(function.next_block(new_block), Some(exit));
        assert_eq!(function.arguments(block), &[arg]);
        assert!(!function.block(new_block).has_arguments());
        assert_eq!(function.block(block).num_ops(), 2);
        assert_eq!(function.block(new_block).num_ops(), 2);
        // The branch to `exit` moved, so `exit` now has `new_block` as its predecessor
        assert_eq!(function.predecessors(exit).collect::<Vec<_>>(), [new_block]);
    }

    #[test]
    fn split_block_at_front() {
        let mut function = Function::new("test");
        let (block, ops, _) = straight_line_block(&mut function);

        let new_block = function.split_block(block, ops[0]);

        assert!(function.block(block).is_empty());
        assert_eq!(function.ops(new_block).collect::<Vec<_>>(), ops);
    }

    #[test]
    fn split_block_and_branch_restores_terminator() {
        let mut function = Function::new("test");
        let (block, [a, b, c, d], _) = straight_line_block(&mut function);
        let span = SourceSpan::SYNTHETIC;

        let new_block = function.split_block_and_branch(block, c, span);

        let br = function.terminator(block);
        assert_eq!(function.ops(block).collect::<Vec<_>>(), [a, b, br]);
        assert_eq!(function.ops(new_block).collect::<Vec<_>>(), [c, d]);
        assert_eq!(function.op(br).name(), "cf.br");
        assert_eq!(function.op(br).span(), span);
        assert_eq!(function.successor_blocks(block).collect::<Vec<_>>(), [new_block]);
        assert_eq!(function.predecessor_edges(new_block).collect::<Vec<_>>(), function.successors(block));
        function.verify_cfg_links().expect("links should be consistent");
    }

    #[test]
    fn single_predecessor_counts_edges() {
        let mut function = Function::new("test");
        let entry = function.create_block();
        let target = function.create_block();
        function.insert_op(OperationState::cond_br(target, target), ProgramPoint::End(entry));

        assert_eq!(function.predecessors(target).collect::<Vec<_>>(), [entry, entry]);
        assert_eq!(function.get_single_predecessor(target), None);
        assert_eq!(function.get_unique_predecessor(target), Some(entry));
        assert_eq!(function.get_single_successor(entry), None);
    }

    #[test]
    fn unique_predecessor_requires_one_source_block() {
        let mut function = Function::new("test");
        let a = function.create_block();
        let b = function.create_block();
        let exit = function.create_block();
        function.insert_op(OperationState::br(exit), ProgramPoint::End(a));
        function.insert_op(OperationState::br(exit), ProgramPoint::End(b));

        assert_eq!(function.get_single_predecessor(exit), None);
        assert_eq!(function.get_unique_predecessor(exit), None);
        assert_eq!(function.get_unique_predecessor(a), None);
    }

    #[test]
    fn predecessor_iteration_is_restartable() {
        let mut function = Function::new("test");
        let a = function.create_block();
        let b = function.create_block();
        let exit = function.create_block();
        function.insert_op(OperationState::br(exit), ProgramPoint::End(a));
        function.insert_op(OperationState::br(exit), ProgramPoint::End(b));

        let preds = function.predecessors(exit);
        assert_eq!(preds.len(), 2);
        assert_eq!(preds.clone().collect::<Vec<_>>(), [a, b]);
        assert_eq!(preds.collect::<Vec<_>>(), [a, b]);
        assert_eq!(function.predecessors(exit).collect::<Vec<_>>(), [a, b]);
    }

    #[test]
    #[should_panic(expected = "is empty")]
    fn terminator_of_empty_block() {
        let mut function = Function::new("test");
        let block = function.create_block();
        function.terminator(block);
    }

    #[test]
    #[should_panic(expected = "which is not a terminator")]
    fn terminator_of_unterminated_block() {
        let mut function = Function::new("test");
        let block = function.create_block();
        function.insert_op(OperationState::new("test.op"), ProgramPoint::End(block));
        function.successors(block);
    }

    #[test]
    #[should_panic(expected = "does not belong to the block being split")]
    fn split_block_with_foreign_op() {
        let mut function = Function::new("test");
        let (block, _, exit) = straight_line_block(&mut function);
        let ret = function.terminator(exit);
        function.split_block(block, ret);
    }
}
