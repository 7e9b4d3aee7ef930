use core::fmt;

use super::*;
use crate::{SmallStr, SmallVec, SourceSpan};

/// The name of the unconditional branch primitive
pub(super) const BR: &str = "cf.br";
/// The name of the conditional branch primitive
pub(super) const COND_BR: &str = "cf.cond_br";
/// The name of the multi-way branch primitive
pub(super) const SWITCH: &str = "cf.switch";
/// The name of the function return primitive
pub(super) const RET: &str = "builtin.ret";

/// An [Operation] is a single instruction in the body of a [Block].
///
/// Only the aspects of an operation that matter to the control-flow graph are modeled here: its
/// opcode name, whether or not it terminates its block, and, for terminators, the edge records
/// of its successors, in successor order.
pub struct Operation {
    pub(super) name: SmallStr,
    pub(super) span: SourceSpan,
    pub(super) terminator: bool,
    /// The edge records owned by this op, one per successor
    pub(super) successors: SmallVec<[BlockOperandRef; 2]>,
    /// The block containing this op
    pub(super) block: BlockRef,
    pub(super) prev: Option<OperationRef>,
    pub(super) next: Option<OperationRef>,
}

impl Operation {
    /// The opcode name of this operation, e.g. `cf.br`
    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[inline(always)]
    pub fn span(&self) -> SourceSpan {
        self.span
    }

    /// Returns true if this operation terminates its containing block
    #[inline(always)]
    pub const fn is_terminator(&self) -> bool {
        self.terminator
    }

    /// The edge records of this operation's successors, in successor order
    #[inline]
    pub fn successors(&self) -> &[BlockOperandRef] {
        self.successors.as_slice()
    }

    #[inline]
    pub fn has_successors(&self) -> bool {
        !self.successors.is_empty()
    }

    #[inline]
    pub fn num_successors(&self) -> usize {
        self.successors.len()
    }

    /// The block containing this operation
    #[inline(always)]
    pub const fn parent(&self) -> BlockRef {
        self.block
    }

    /// The operation following this one in its block, if any
    #[inline(always)]
    pub const fn next(&self) -> Option<OperationRef> {
        self.next
    }

    /// The operation preceding this one in its block, if any
    #[inline(always)]
    pub const fn prev(&self) -> Option<OperationRef> {
        self.prev
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("terminator", &self.terminator)
            .field("successors", &self.successors)
            .field("block", &self.block)
            .finish_non_exhaustive()
    }
}

/// [OperationState] describes an [Operation] that has not been materialized yet.
///
/// It is handed to [Function::insert_op], which allocates the op and its edge records.
#[derive(Debug, Clone)]
pub struct OperationState {
    pub name: SmallStr,
    pub span: SourceSpan,
    pub terminator: bool,
    /// The successor blocks of the op, duplicates allowed
    pub successors: SmallVec<[BlockRef; 2]>,
}

impl OperationState {
    /// Describe a non-terminator operation called `name`
    pub fn new(name: impl Into<SmallStr>) -> Self {
        Self {
            name: name.into(),
            span: SourceSpan::default(),
            terminator: false,
            successors: SmallVec::new(),
        }
    }

    /// Describe a terminator called `name` which transfers control to `successors`, in order
    pub fn terminator<I>(name: impl Into<SmallStr>, successors: I) -> Self
    where
        I: IntoIterator<Item = BlockRef>,
    {
        Self {
            name: name.into(),
            span: SourceSpan::default(),
            terminator: true,
            successors: successors.into_iter().collect(),
        }
    }

    /// An unconditional branch to `dest`
    pub fn br(dest: BlockRef) -> Self {
        Self::terminator(BR, [dest])
    }

    /// A conditional branch to either `then_dest` or `else_dest`
    pub fn cond_br(then_dest: BlockRef, else_dest: BlockRef) -> Self {
        Self::terminator(COND_BR, [then_dest, else_dest])
    }

    /// A multi-way branch with one successor per case, followed by `fallback`
    pub fn switch<I>(cases: I, fallback: BlockRef) -> Self
    where
        I: IntoIterator<Item = BlockRef>,
    {
        Self::terminator(SWITCH, cases.into_iter().chain(core::iter::once(fallback)))
    }

    /// A return from the enclosing function
    pub fn ret() -> Self {
        Self::terminator(RET, [])
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = span;
        self
    }
}

/// Operations
impl Function {
    /// Get the operation identified by `op`
    #[track_caller]
    pub fn op(&self, op: OperationRef) -> &Operation {
        self.get::<Operation>(op)
    }

    /// Materialize `state` as a new operation at `point`.
    ///
    /// If `state` describes a terminator, an edge record is created for each of its successors,
    /// and linked into the predecessor list of the corresponding block, in successor order.
    ///
    /// # Panics
    ///
    /// Panics if the op would be placed after the terminator of its block, if a terminator would
    /// be placed anywhere but at the end of its block, or if `state` has successors but does not
    /// describe a terminator.
    #[track_caller]
    pub fn insert_op(&mut self, state: OperationState, point: ProgramPoint) -> OperationRef {
        assert!(
            state.terminator || state.successors.is_empty(),
            "cannot insert {}: only a terminator may have successors",
            state.name
        );
        let (block, after) = self.resolve_program_point(point);
        self.assert_valid_placement(block, after, state.terminator, None);

        let OperationState {
            name,
            span,
            terminator,
            successors: targets,
        } = state;
        for target in targets.iter() {
            let _ = self.block(*target);
        }
        let op = self.allocate(Operation {
            name,
            span,
            terminator,
            successors: SmallVec::new(),
            block,
            prev: None,
            next: None,
        });
        self.link_op(op, block, after);

        let successors = targets
            .into_iter()
            .enumerate()
            .map(|(index, target)| self.create_edge(target, op, index))
            .collect();
        self.storage.ops[op].successors = successors;

        log::trace!(target: "cfg", "inserted {op} ({}) in {block}", self.op(op).name());
        op
    }

    /// Unlink `op` from its block, destroy its edge records, and release it
    pub fn erase_op(&mut self, op: OperationRef) {
        self.unlink_op(op);
        let successors = core::mem::take(&mut self.storage.ops[op].successors);
        for edge in successors {
            self.destroy_edge(edge);
        }
        let Operation { name, block, .. } = self.release::<Operation>(op);
        log::trace!(target: "cfg", "erased {op} ({name}) from {block}");
    }

    /// Move `op` so that it immediately precedes `before`, which may be in another block.
    ///
    /// The edge records of `op` are untouched: the predecessor lists of its successors are
    /// keyed on the op, so they now implicitly refer to the new containing block.
    #[track_caller]
    pub fn move_op_before(&mut self, op: OperationRef, before: OperationRef) {
        if op == before {
            return;
        }
        let (block, after) = self.resolve_program_point(ProgramPoint::Before(before));
        let after = if after == Some(op) { self.op(op).prev } else { after };
        self.assert_valid_placement(block, after, self.op(op).terminator, Some(op));
        self.unlink_op(op);
        self.link_op(op, block, after);
        log::trace!(target: "cfg", "moved {op} before {before} in {block}");
    }

    /// Move `op` to the end of `block`.
    #[track_caller]
    pub fn move_op_to_end(&mut self, op: OperationRef, block: BlockRef) {
        let after = self.block(block).last_op;
        let after = if after == Some(op) { self.op(op).prev } else { after };
        self.assert_valid_placement(block, after, self.op(op).terminator, Some(op));
        self.unlink_op(op);
        self.link_op(op, block, after);
        log::trace!(target: "cfg", "moved {op} to the end of {block}");
    }

    /// Erase the terminator of `block`, and append a new terminator described by `state`.
    ///
    /// The old terminator's edge records are destroyed, so its former successors lose `block`
    /// as a predecessor (once per edge), before the new edges are linked.
    ///
    /// # Panics
    ///
    /// Panics if `block` has no terminator, or if `state` does not describe a terminator.
    #[track_caller]
    pub fn replace_terminator(&mut self, block: BlockRef, state: OperationState) -> OperationRef {
        assert!(state.terminator, "cannot replace the terminator of {block} with a non-terminator");
        let old = self.terminator(block);
        self.erase_op(old);
        let new = self.insert_op(state, ProgramPoint::End(block));
        log::trace!(target: "cfg", "replaced terminator {old} of {block} with {new}");
        new
    }

    /// Convert `point` into the block and the op after which an op placed at `point` is linked.
    #[track_caller]
    pub(super) fn resolve_program_point(
        &self,
        point: ProgramPoint,
    ) -> (BlockRef, Option<OperationRef>) {
        match point {
            ProgramPoint::Start(block) => {
                let _ = self.block(block);
                (block, None)
            }
            ProgramPoint::End(block) => (block, self.block(block).last_op),
            ProgramPoint::Before(op) => {
                let op = self.op(op);
                (op.block, op.prev)
            }
            ProgramPoint::After(op) => (self.op(op).block, Some(op)),
        }
    }

    /// A terminator may only be placed at the end of its block, and nothing may follow it.
    ///
    /// When `moving` is set, that op is about to be unlinked, so it does not count as following
    /// the insertion point.
    #[track_caller]
    fn assert_valid_placement(
        &self,
        block: BlockRef,
        after: Option<OperationRef>,
        is_terminator: bool,
        moving: Option<OperationRef>,
    ) {
        let mut next = match after {
            Some(after) => {
                assert!(
                    !self.op(after).is_terminator(),
                    "cannot insert an operation after {after}: it is the terminator of {block}"
                );
                self.op(after).next
            }
            None => self.block(block).first_op,
        };
        if let Some(op) = next.filter(|next| Some(*next) == moving) {
            next = self.op(op).next;
        }
        assert!(
            !is_terminator || next.is_none(),
            "cannot insert a terminator in the middle of {block}"
        );
    }

    /// Link `op` into the op list of `block`, following `after`, or at the front if `None`
    pub(super) fn link_op(
        &mut self,
        op: OperationRef,
        block: BlockRef,
        after: Option<OperationRef>,
    ) {
        let next = match after {
            Some(after) => self.storage.ops[after].next,
            None => self.block(block).first_op,
        };
        {
            let op = &mut self.storage.ops[op];
            op.block = block;
            op.prev = after;
            op.next = next;
        }
        match after {
            Some(after) => self.storage.ops[after].next = Some(op),
            None => self.block_mut(block).first_op = Some(op),
        }
        match next {
            Some(next) => self.storage.ops[next].prev = Some(op),
            None => self.block_mut(block).last_op = Some(op),
        }
        self.block_mut(block).num_ops += 1;
    }

    /// Unlink `op` from the op list of its block. The op keeps its `block`, but has no siblings.
    pub(super) fn unlink_op(&mut self, op: OperationRef) {
        let (block, prev, next) = {
            let op = &mut self.storage.ops[op];
            (op.block, op.prev.take(), op.next.take())
        };
        match prev {
            Some(prev) => self.storage.ops[prev].next = next,
            None => self.block_mut(block).first_op = next,
        }
        match next {
            Some(next) => self.storage.ops[next].prev = prev,
            None => self.block_mut(block).last_op = prev,
        }
        self.block_mut(block).num_ops -= 1;
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn insert_op_at_program_points() {
        let mut function = Function::new("test");
        let block = function.create_block();

        let b = function.insert_op(OperationState::new("test.b"), ProgramPoint::End(block));
        let a = function.insert_op(OperationState::new("test.a"), ProgramPoint::Start(block));
        let d = function.insert_op(OperationState::new("test.d"), ProgramPoint::After(b));
        let c = function.insert_op(OperationState::new("test.c"), ProgramPoint::Before(d));

        assert_eq!(function.ops(block).collect::<Vec<_>>(), [a, b, c, d]);
        assert_eq!(function.ops(block).rev().collect::<Vec<_>>(), [d, c, b, a]);
        assert_eq!(function.block(block).front(), Some(a));
        assert_eq!(function.block(block).back(), Some(d));
        assert_eq!(function.op(c).parent(), block);
        assert_eq!(function.op(c).name(), "test.c");
        assert!(!function.has_terminator(block));
    }

    #[test]
    fn terminator_edges_follow_successor_order() {
        let mut function = Function::new("test");
        let entry = function.create_block();
        let a = function.create_block();
        let b = function.create_block();

        let switch = function.insert_op(OperationState::switch([a, b, a], b), ProgramPoint::End(entry));

        let op = function.op(switch);
        assert!(op.is_terminator());
        assert_eq!(op.num_successors(), 4);
        for (index, edge) in op.successors().iter().enumerate() {
            assert_eq!(function.edge(*edge).index(), index);
            assert_eq!(function.edge(*edge).owner(), switch);
        }
        assert_eq!(function.successor_blocks(entry).collect::<Vec<_>>(), [a, b, a, b]);
        assert_eq!(function.predecessors(a).collect::<Vec<_>>(), [entry, entry]);
        assert_eq!(function.predecessors(b).collect::<Vec<_>>(), [entry, entry]);
    }

    #[test]
    fn erase_op_destroys_edges() {
        let mut function = Function::new("test");
        let entry = function.create_block();
        let a = function.create_block();
        let b = function.create_block();

        let cond_br = function.insert_op(OperationState::cond_br(a, b), ProgramPoint::End(entry));
        let edges = function.op(cond_br).successors().to_vec();

        function.erase_op(cond_br);

        assert!(!function.contains_op(cond_br));
        assert!(edges.iter().all(|edge| !function.contains_edge(*edge)));
        assert!(!function.block(a).has_predecessors());
        assert!(!function.block(b).has_predecessors());
        assert!(function.block(entry).is_empty());
        function.verify_cfg_links().expect("links should be consistent");
    }

    #[test]
    fn replace_terminator_rewires_predecessors() {
        let mut function = Function::new("test");
        let entry = function.create_block();
        let a = function.create_block();
        let b = function.create_block();
        let c = function.create_block();

        function.insert_op(OperationState::cond_br(a, b), ProgramPoint::End(entry));
        let br = function.replace_terminator(entry, OperationState::br(c));

        assert_eq!(function.terminator(entry), br);
        assert_eq!(function.num_successors(entry), 1);
        assert!(!function.block(a).has_predecessors());
        assert!(!function.block(b).has_predecessors());
        assert_eq!(function.predecessors(c).collect::<Vec<_>>(), [entry]);
        function.verify_cfg_links().expect("links should be consistent");
    }

    #[test]
    fn moved_terminator_changes_predecessor_block() {
        let mut function = Function::new("test");
        let a = function.create_block();
        let b = function.create_block();
        let exit = function.create_block();

        let br = function.insert_op(OperationState::br(exit), ProgramPoint::End(a));
        function.move_op_to_end(br, b);

        assert!(function.block(a).is_empty());
        assert_eq!(function.op(br).parent(), b);
        assert_eq!(function.predecessors(exit).collect::<Vec<_>>(), [b]);
        function.verify_cfg_links().expect("links should be consistent");
    }

    #[test]
    fn move_op_before_within_block() {
        let mut function = Function::new("test");
        let block = function.create_block();
        let a = function.insert_op(OperationState::new("test.a"), ProgramPoint::End(block));
        let b = function.insert_op(OperationState::new("test.b"), ProgramPoint::End(block));
        let ret = function.insert_op(OperationState::ret(), ProgramPoint::End(block));

        function.move_op_before(a, ret);
        assert_eq!(function.ops(block).collect::<Vec<_>>(), [b, a, ret]);

        function.move_op_before(a, a);
        assert_eq!(function.ops(block).collect::<Vec<_>>(), [b, a, ret]);

        // The terminator is already last, so this leaves it where it is
        function.move_op_to_end(ret, block);
        assert_eq!(function.ops(block).collect::<Vec<_>>(), [b, a, ret]);
        function.move_op_before(b, a);
        assert_eq!(function.ops(block).collect::<Vec<_>>(), [b, a, ret]);
    }

    #[cfg(feature = "std")]
    #[test]
    fn rejected_move_leaves_op_in_place() {
        use std::panic::{AssertUnwindSafe, catch_unwind};

        let mut function = Function::new("test");
        let a = function.create_block();
        let b = function.create_block();
        let op = function.insert_op(OperationState::new("test.op"), ProgramPoint::End(a));
        let ret_a = function.insert_op(OperationState::ret(), ProgramPoint::End(a));
        let ret_b = function.insert_op(OperationState::ret(), ProgramPoint::End(b));

        let moved = catch_unwind(AssertUnwindSafe(|| function.move_op_to_end(op, b)));
        assert!(moved.is_err());
        let moved = catch_unwind(AssertUnwindSafe(|| function.move_op_before(ret_a, op)));
        assert!(moved.is_err());

        assert_eq!(function.ops(a).collect::<Vec<_>>(), [op, ret_a]);
        assert_eq!(function.ops(b).collect::<Vec<_>>(), [ret_b]);
        assert_eq!(function.op(op).parent(), a);
        function.verify_cfg_links().expect("links should be consistent");
    }

    #[test]
    fn wide_switch_owns_one_edge_per_case() {
        let mut function = Function::new("test");
        let entry = function.create_block();
        let target = function.create_block();
        let fallback = function.create_block();

        let cases = core::iter::repeat_n(target, 300);
        let switch =
            function.insert_op(OperationState::switch(cases, fallback), ProgramPoint::End(entry));

        let successors = function.op(switch).successors();
        assert_eq!(successors.len(), 301);
        assert_eq!(function.edge(successors[299]).index(), 299);
        assert_eq!(function.edge(successors[300]).block(), fallback);
        assert_eq!(function.block(target).num_predecessors(), 300);
        assert_eq!(function.get_single_predecessor(fallback), Some(entry));
        function.verify_cfg_links().expect("links should be consistent");
    }

    #[test]
    #[should_panic(expected = "only a terminator may have successors")]
    fn insert_non_terminator_with_successors() {
        let mut function = Function::new("test");
        let entry = function.create_block();
        let target = function.create_block();

        let mut state = OperationState::new("test.op");
        state.successors.push(target);
        function.insert_op(state, ProgramPoint::End(entry));
    }

    #[test]
    #[should_panic(expected = "it is the terminator of")]
    fn insert_after_terminator() {
        let mut function = Function::new("test");
        let block = function.create_block();
        function.insert_op(OperationState::ret(), ProgramPoint::End(block));
        function.insert_op(OperationState::new("test.op"), ProgramPoint::End(block));
    }

    #[test]
    #[should_panic(expected = "cannot insert a terminator in the middle of")]
    fn insert_terminator_before_op() {
        let mut function = Function::new("test");
        let block = function.create_block();
        function.insert_op(OperationState::new("test.op"), ProgramPoint::End(block));
        function.insert_op(OperationState::ret(), ProgramPoint::Start(block));
    }

    #[test]
    #[should_panic(expected = "with a non-terminator")]
    fn replace_terminator_with_non_terminator() {
        let mut function = Function::new("test");
        let block = function.create_block();
        function.insert_op(OperationState::ret(), ProgramPoint::End(block));
        function.replace_terminator(block, OperationState::new("test.op"));
    }
}
