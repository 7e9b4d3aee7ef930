use cranelift_entity::EntityRef;

use super::*;
use crate::FxHashSet;

/// An inconsistency between the edge records, op lists and argument lists of a [Function],
/// found by [Function::verify_cfg_links].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CfgLinkError {
    #[error("{edge} is linked into the predecessor list of {block}, but it targets {target}")]
    EdgeTargetMismatch {
        edge: BlockOperandRef,
        block: BlockRef,
        target: BlockRef,
    },
    #[error("{edge} appears more than once in the predecessor list of {block}")]
    DuplicatePredecessor { edge: BlockOperandRef, block: BlockRef },
    #[error("invalid {reference} reference: entity #{index} is not live")]
    DanglingReference { reference: &'static str, index: usize },
    #[error("the {list} list of {block} is not properly linked")]
    BrokenLinks { block: BlockRef, list: &'static str },
    #[error("{block} expected {expected} entries in its {list} list, found {actual}")]
    CountMismatch {
        block: BlockRef,
        list: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{edge} is not successor #{index} of its owner {owner}")]
    SuccessorMismatch {
        edge: BlockOperandRef,
        owner: OperationRef,
        index: usize,
    },
    #[error("{edge} is owned by {owner}, which is not a terminator")]
    NonTerminatorEdge { edge: BlockOperandRef, owner: OperationRef },
    #[error("{edge} is not linked into the predecessor list of its target {target}")]
    UnlinkedEdge { edge: BlockOperandRef, target: BlockRef },
    #[error("{op} is listed in {block}, but its parent is {parent}")]
    OpParentMismatch {
        op: OperationRef,
        block: BlockRef,
        parent: BlockRef,
    },
    #[error("terminator {op} is not the last operation of {block}")]
    MisplacedTerminator { op: OperationRef, block: BlockRef },
    #[error(
        "argument {arg} of {block} is at position {position}, but records owner {owner}, index \
         {index}"
    )]
    ArgumentMismatch {
        arg: BlockArgumentRef,
        block: BlockRef,
        position: usize,
        owner: BlockRef,
        index: usize,
    },
}

/// Verification
impl Function {
    /// Check that the structural links of this function are consistent.
    ///
    /// In particular, this checks edge symmetry: every edge record in the predecessor list of a
    /// block targets that block and appears there once, is listed among the successors of its
    /// owning terminator, and conversely every successor edge of a terminator is linked into the
    /// predecessor list of its target. It also checks that op lists and argument lists agree with
    /// the parent and index recorded by their elements.
    ///
    /// Blocks which are not in the layout are checked too.
    pub fn verify_cfg_links(&self) -> Result<(), CfgLinkError> {
        let mut linked_edges = FxHashSet::default();
        for (block, data) in self.storage.blocks.iter() {
            self.verify_predecessors(block, data, &mut linked_edges)?;
            self.verify_ops(block, data)?;
            self.verify_arguments(block, data)?;
        }

        for (op, data) in self.storage.ops.iter() {
            for (index, edge) in data.successors().iter().copied().enumerate() {
                let Some(record) = self.storage.edges.try_get(edge) else {
                    return Err(CfgLinkError::DanglingReference {
                        reference: "successor edge",
                        index: edge.index(),
                    });
                };
                if record.owner != op || record.index() != index {
                    return Err(CfgLinkError::SuccessorMismatch {
                        edge,
                        owner: op,
                        index,
                    });
                }
                if !linked_edges.contains(&edge) {
                    return Err(CfgLinkError::UnlinkedEdge {
                        edge,
                        target: record.block,
                    });
                }
            }
        }

        log::trace!(target: "cfg", "verified links of @{} ({} edges)", self.name, linked_edges.len());
        Ok(())
    }

    fn verify_predecessors(
        &self,
        block: BlockRef,
        data: &Block,
        linked_edges: &mut FxHashSet<BlockOperandRef>,
    ) -> Result<(), CfgLinkError> {
        let mut count = 0;
        let mut prev = None;
        let mut cursor = data.first_pred;
        while let Some(edge) = cursor {
            let Some(record) = self.storage.edges.try_get(edge) else {
                return Err(CfgLinkError::DanglingReference {
                    reference: "predecessor edge",
                    index: edge.index(),
                });
            };
            if record.block != block {
                return Err(CfgLinkError::EdgeTargetMismatch {
                    edge,
                    block,
                    target: record.block,
                });
            }
            if !linked_edges.insert(edge) {
                return Err(CfgLinkError::DuplicatePredecessor { edge, block });
            }
            if record.prev != prev {
                return Err(CfgLinkError::BrokenLinks {
                    block,
                    list: "predecessor",
                });
            }
            let Some(owner) = self.storage.ops.try_get(record.owner) else {
                return Err(CfgLinkError::DanglingReference {
                    reference: "edge owner",
                    index: record.owner.index(),
                });
            };
            if !owner.is_terminator() {
                return Err(CfgLinkError::NonTerminatorEdge {
                    edge,
                    owner: record.owner,
                });
            }
            if owner.successors().get(record.index()) != Some(&edge) {
                return Err(CfgLinkError::SuccessorMismatch {
                    edge,
                    owner: record.owner,
                    index: record.index(),
                });
            }
            count += 1;
            prev = Some(edge);
            cursor = record.next;
        }

        if data.last_pred != prev {
            return Err(CfgLinkError::BrokenLinks {
                block,
                list: "predecessor",
            });
        }
        if data.num_preds != count {
            return Err(CfgLinkError::CountMismatch {
                block,
                list: "predecessor",
                expected: data.num_preds,
                actual: count,
            });
        }
        Ok(())
    }

    fn verify_ops(&self, block: BlockRef, data: &Block) -> Result<(), CfgLinkError> {
        let mut count = 0;
        let mut prev = None;
        let mut cursor = data.first_op;
        while let Some(op) = cursor {
            let Some(op_data) = self.storage.ops.try_get(op) else {
                return Err(CfgLinkError::DanglingReference {
                    reference: "operation",
                    index: op.index(),
                });
            };
            if op_data.block != block {
                return Err(CfgLinkError::OpParentMismatch {
                    op,
                    block,
                    parent: op_data.block,
                });
            }
            if op_data.prev != prev || count >= self.storage.ops.len() {
                return Err(CfgLinkError::BrokenLinks { block, list: "op" });
            }
            if op_data.is_terminator() && op_data.next.is_some() {
                return Err(CfgLinkError::MisplacedTerminator { op, block });
            }
            count += 1;
            prev = Some(op);
            cursor = op_data.next;
        }

        if data.last_op != prev {
            return Err(CfgLinkError::BrokenLinks { block, list: "op" });
        }
        if data.num_ops != count {
            return Err(CfgLinkError::CountMismatch {
                block,
                list: "op",
                expected: data.num_ops,
                actual: count,
            });
        }
        Ok(())
    }

    fn verify_arguments(&self, block: BlockRef, data: &Block) -> Result<(), CfgLinkError> {
        for (position, arg) in data.arguments.iter().copied().enumerate() {
            let Some(arg_data) = self.storage.arguments.try_get(arg) else {
                return Err(CfgLinkError::DanglingReference {
                    reference: "block argument",
                    index: arg.index(),
                });
            };
            if arg_data.owner != block || arg_data.index != position {
                return Err(CfgLinkError::ArgumentMismatch {
                    arg,
                    block,
                    position,
                    owner: arg_data.owner,
                    index: arg_data.index,
                });
            }
        }
        Ok(())
    }
}
