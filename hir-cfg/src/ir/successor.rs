use core::fmt;

use super::*;

/// A [BlockOperand] is the edge record of a single control-flow edge.
///
/// Each terminator owns one edge record per branch destination (a multi-way branch owns one per
/// case, even when several cases share a destination). The record is also a node of an intrusive,
/// doubly-linked list anchored at the destination block: walking that list from the head stored
/// in the destination [Block] produces its predecessor edges.
///
/// Edge records are only ever created, destroyed and retargeted through the owning [Function],
/// which keeps the record and the predecessor list it is threaded through in agreement.
pub struct BlockOperand {
    /// The destination block of this edge
    pub(super) block: BlockRef,
    /// The terminator which owns this edge
    pub(super) owner: OperationRef,
    /// The index of this edge in the successor list of `owner`
    pub(super) index: usize,
    pub(super) prev: Option<BlockOperandRef>,
    pub(super) next: Option<BlockOperandRef>,
}

impl BlockOperand {
    /// The destination block of this edge
    #[inline(always)]
    pub const fn block(&self) -> BlockRef {
        self.block
    }

    /// The terminator operation this edge belongs to
    #[inline(always)]
    pub const fn owner(&self) -> OperationRef {
        self.owner
    }

    /// The position of this edge in the successor list of its owner
    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The next edge in the predecessor list of [Self::block], if any
    #[inline(always)]
    pub const fn next_use(&self) -> Option<BlockOperandRef> {
        self.next
    }

    /// The previous edge in the predecessor list of [Self::block], if any
    #[inline(always)]
    pub const fn prev_use(&self) -> Option<BlockOperandRef> {
        self.prev
    }
}

impl fmt::Debug for BlockOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockOperand")
            .field("block", &self.block)
            .field("owner", &self.owner)
            .field("index", &self.index)
            .finish()
    }
}

/// Edge records
impl Function {
    /// Get the edge record identified by `edge`
    #[track_caller]
    pub fn edge(&self, edge: BlockOperandRef) -> &BlockOperand {
        self.get::<BlockOperand>(edge)
    }

    /// Allocate a new edge from `owner` to `target`, and link it into the predecessor list of
    /// `target`.
    pub(super) fn create_edge(
        &mut self,
        target: BlockRef,
        owner: OperationRef,
        index: usize,
    ) -> BlockOperandRef {
        let edge = self.allocate(BlockOperand {
            block: target,
            owner,
            index,
            prev: None,
            next: None,
        });
        self.link_edge(edge);
        edge
    }

    /// Unlink `edge` from the predecessor list of its destination, and release it.
    pub(super) fn destroy_edge(&mut self, edge: BlockOperandRef) {
        self.unlink_edge(edge);
        let BlockOperand { block, owner, .. } = self.release::<BlockOperand>(edge);
        log::trace!(target: "cfg", "destroyed {edge} ({owner} -> {block})");
    }

    /// Change the destination of `edge` to `target`.
    ///
    /// The edge is moved from the predecessor list of its current destination to the end of the
    /// predecessor list of `target` before this function returns, so no caller can observe the
    /// edge linked into neither (or both) lists.
    pub fn retarget_edge(&mut self, edge: BlockOperandRef, target: BlockRef) {
        let prev_target = self.edge(edge).block;
        if prev_target == target {
            return;
        }
        // Validate the new destination before touching any links
        let _ = self.block(target);

        self.unlink_edge(edge);
        self.storage.edges[edge].block = target;
        self.link_edge(edge);
        log::trace!(target: "cfg", "retargeted {edge} from {prev_target} to {target}");
    }

    /// Change the `index`th successor of the terminator `op` to `target`.
    ///
    /// # Panics
    ///
    /// Panics if `op` has no successor at `index`.
    #[track_caller]
    pub fn set_successor(&mut self, op: OperationRef, index: usize, target: BlockRef) {
        let successors = self.op(op).successors();
        let edge = *successors.get(index).unwrap_or_else(|| {
            panic!(
                "invalid successor index {index} for {op}: it only has {} successors",
                successors.len()
            )
        });
        self.retarget_edge(edge, target);
    }

    /// Append `edge` to the predecessor list of its destination
    fn link_edge(&mut self, edge: BlockOperandRef) {
        let target = self.storage.edges[edge].block;
        let tail = self.block(target).last_pred;
        {
            let record = &mut self.storage.edges[edge];
            record.prev = tail;
            record.next = None;
        }
        match tail {
            Some(tail) => self.storage.edges[tail].next = Some(edge),
            None => self.block_mut(target).first_pred = Some(edge),
        }
        let block = self.block_mut(target);
        block.last_pred = Some(edge);
        block.num_preds += 1;
    }

    /// Remove `edge` from the predecessor list of its destination
    fn unlink_edge(&mut self, edge: BlockOperandRef) {
        let (target, prev, next) = {
            let record = &mut self.storage.edges[edge];
            (record.block, record.prev.take(), record.next.take())
        };
        match prev {
            Some(prev) => self.storage.edges[prev].next = next,
            None => self.block_mut(target).first_pred = next,
        }
        match next {
            Some(next) => self.storage.edges[next].prev = prev,
            None => self.block_mut(target).last_pred = prev,
        }
        self.block_mut(target).num_preds -= 1;
    }
}
