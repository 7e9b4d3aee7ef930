mod argument;
mod block;
mod builder;
pub mod cfg;
mod entity;
mod function;
mod operation;
mod print;
mod successor;
mod verify;

pub use self::{
    argument::BlockArgument,
    block::{Block, BlockOpIter, PredecessorEdgeIter, PredecessorIter, SuccessorIter},
    builder::{OpBuilder, ProgramPoint},
    entity::{BlockArgumentRef, BlockOperandRef, BlockRef, FunctionId, OperationRef},
    function::{BlockIter, Function},
    operation::{Operation, OperationState},
    print::{DisplayBlockOperand, PrintingFlags},
    successor::BlockOperand,
    verify::CfgLinkError,
};
