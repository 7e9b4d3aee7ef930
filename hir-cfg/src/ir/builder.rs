use super::*;
use crate::{SmallStr, SourceSpan};

/// A [ProgramPoint] is a position in the operation list of a block at which new operations are
/// inserted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProgramPoint {
    /// At the start of the block, before its first operation
    Start(BlockRef),
    /// At the end of the block, after its last operation
    End(BlockRef),
    /// Immediately before the given operation
    Before(OperationRef),
    /// Immediately after the given operation
    After(OperationRef),
}

impl ProgramPoint {
    /// Get the block this program point is in
    pub fn block(&self, function: &Function) -> BlockRef {
        match *self {
            Self::Start(block) | Self::End(block) => block,
            Self::Before(op) | Self::After(op) => function.op(op).parent(),
        }
    }

    /// Get the operation this program point is relative to, if any
    pub fn operation(&self) -> Option<OperationRef> {
        match *self {
            Self::Start(_) | Self::End(_) => None,
            Self::Before(op) | Self::After(op) => Some(op),
        }
    }
}

/// An [OpBuilder] inserts operations into a [Function] at a moving insertion point.
///
/// Ops inserted at the start of a block, or after some op, advance the insertion point past
/// themselves, so consecutive insertions come out in program order.
pub struct OpBuilder<'f> {
    func: &'f mut Function,
    ip: Option<ProgramPoint>,
}

impl<'f> OpBuilder<'f> {
    /// Create a builder positioned at the end of the last block of `func`.
    ///
    /// If `func` has no blocks yet, an entry block is created first.
    pub fn new(func: &'f mut Function) -> Self {
        let current_block = match func.last_block() {
            Some(block) => block,
            None => func.create_block(),
        };
        Self {
            func,
            ip: Some(ProgramPoint::End(current_block)),
        }
    }

    /// Create a builder positioned at `ip`
    pub fn at(func: &'f mut Function, ip: ProgramPoint) -> Self {
        Self { func, ip: Some(ip) }
    }

    #[inline(always)]
    pub fn function(&self) -> &Function {
        self.func
    }

    #[inline(always)]
    pub fn function_mut(&mut self) -> &mut Function {
        self.func
    }

    #[inline]
    pub fn insertion_point(&self) -> Option<ProgramPoint> {
        self.ip
    }

    #[inline]
    pub fn set_insertion_point(&mut self, ip: ProgramPoint) {
        self.ip = Some(ip);
    }

    #[inline]
    pub fn clear_insertion_point(&mut self) -> Option<ProgramPoint> {
        self.ip.take()
    }

    /// Get the block the insertion point is in
    ///
    /// # Panics
    ///
    /// Panics if there is no insertion point set.
    #[track_caller]
    pub fn current_block(&self) -> BlockRef {
        match self.ip {
            Some(ip) => ip.block(self.func),
            None => panic!("builder has no insertion point set"),
        }
    }

    /// Move the insertion point to the end of `block`
    #[inline]
    pub fn switch_to_block(&mut self, block: BlockRef) {
        self.ip = Some(ProgramPoint::End(block));
    }

    /// Create a new block at the end of the function layout. The insertion point is unchanged.
    pub fn create_block(&mut self) -> BlockRef {
        self.func.create_block()
    }

    /// Append an argument to `block`
    pub fn append_block_param(&mut self, block: BlockRef, span: SourceSpan) -> BlockArgumentRef {
        self.func.add_argument(block, span)
    }

    /// Insert the operation described by `state` at the current insertion point
    #[track_caller]
    pub fn insert(&mut self, state: OperationState) -> OperationRef {
        let Some(ip) = self.ip else {
            panic!("builder has no insertion point set");
        };
        let op = self.func.insert_op(state, ip);
        match ip {
            ProgramPoint::Start(_) | ProgramPoint::After(_) => {
                self.ip = Some(ProgramPoint::After(op));
            }
            ProgramPoint::End(_) | ProgramPoint::Before(_) => (),
        }
        op
    }

    /// Insert a non-terminator operation called `name`
    #[track_caller]
    pub fn op(&mut self, name: impl Into<SmallStr>, span: SourceSpan) -> OperationRef {
        self.insert(OperationState::new(name).with_span(span))
    }

    /// Insert an unconditional branch to `dest`
    #[track_caller]
    pub fn br(&mut self, dest: BlockRef, span: SourceSpan) -> OperationRef {
        self.insert(OperationState::br(dest).with_span(span))
    }

    /// Insert a conditional branch to `then_dest` or `else_dest`
    #[track_caller]
    pub fn cond_br(
        &mut self,
        then_dest: BlockRef,
        else_dest: BlockRef,
        span: SourceSpan,
    ) -> OperationRef {
        self.insert(OperationState::cond_br(then_dest, else_dest).with_span(span))
    }

    /// Insert a multi-way branch to one of `cases`, or `fallback` if no case applies
    #[track_caller]
    pub fn switch(
        &mut self,
        cases: &[BlockRef],
        fallback: BlockRef,
        span: SourceSpan,
    ) -> OperationRef {
        self.insert(OperationState::switch(cases.iter().copied(), fallback).with_span(span))
    }

    /// Insert a return from the function
    #[track_caller]
    pub fn ret(&mut self, span: SourceSpan) -> OperationRef {
        self.insert(OperationState::ret().with_span(span))
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn builder_creates_entry_block() {
        let mut function = Function::new("test");
        let mut builder = OpBuilder::new(&mut function);
        let entry = builder.current_block();
        builder.ret(SourceSpan::UNKNOWN);

        assert_eq!(function.entry_block(), Some(entry));
        assert!(function.has_terminator(entry));
    }

    #[test]
    fn builder_advances_past_inserted_ops() {
        let mut function = Function::new("test");
        let block = function.create_block();
        let ret = function.insert_op(OperationState::ret(), ProgramPoint::End(block));

        let mut builder = OpBuilder::at(&mut function, ProgramPoint::Start(block));
        let a = builder.op("test.a", SourceSpan::UNKNOWN);
        let b = builder.op("test.b", SourceSpan::UNKNOWN);
        assert_eq!(builder.insertion_point(), Some(ProgramPoint::After(b)));

        builder.set_insertion_point(ProgramPoint::Before(ret));
        let c = builder.op("test.c", SourceSpan::UNKNOWN);
        let d = builder.op("test.d", SourceSpan::UNKNOWN);

        assert_eq!(function.ops(block).collect::<Vec<_>>(), [a, b, c, d, ret]);
    }

    #[test]
    fn builder_control_flow() {
        let mut function = Function::new("test");
        let mut builder = OpBuilder::new(&mut function);
        let entry = builder.current_block();
        let then_block = builder.create_block();
        let else_block = builder.create_block();
        let exit = builder.create_block();
        let arg = builder.append_block_param(exit, SourceSpan::UNKNOWN);

        builder.cond_br(then_block, else_block, SourceSpan::UNKNOWN);
        builder.switch_to_block(then_block);
        builder.br(exit, SourceSpan::UNKNOWN);
        builder.switch_to_block(else_block);
        builder.switch(&[then_block, exit], exit, SourceSpan::UNKNOWN);
        builder.switch_to_block(exit);
        builder.ret(SourceSpan::UNKNOWN);

        assert_eq!(function.successor_blocks(entry).collect::<Vec<_>>(), [then_block, else_block]);
        assert_eq!(
            function.successor_blocks(else_block).collect::<Vec<_>>(),
            [then_block, exit, exit]
        );
        assert_eq!(function.predecessors(exit).collect::<Vec<_>>(), [then_block, else_block, else_block]);
        assert_eq!(function.predecessors(then_block).collect::<Vec<_>>(), [entry, else_block]);
        assert_eq!(function.arguments(exit), &[arg]);
        assert_eq!(function.op(function.terminator(else_block)).name(), "cf.switch");
        function.verify_cfg_links().expect("links should be consistent");
    }
}
