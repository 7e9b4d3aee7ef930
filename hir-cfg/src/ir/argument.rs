use core::fmt;

use super::*;
use crate::SourceSpan;

/// A [BlockArgument] is a value parameter of a [Block], i.e. the SSA value which receives the
/// corresponding operand of every branch to that block.
pub struct BlockArgument {
    /// The block this argument belongs to
    pub(super) owner: BlockRef,
    /// The position of this argument in the argument list of `owner`
    pub(super) index: usize,
    pub(super) span: SourceSpan,
}

impl BlockArgument {
    /// The block this argument belongs to
    #[inline(always)]
    pub const fn owner(&self) -> BlockRef {
        self.owner
    }

    /// The position of this argument in the argument list of its block
    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[inline(always)]
    pub fn span(&self) -> SourceSpan {
        self.span
    }
}

impl fmt::Debug for BlockArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockArgument")
            .field("owner", &self.owner)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Block arguments
impl Function {
    /// Get the block argument identified by `arg`
    #[track_caller]
    pub fn argument(&self, arg: BlockArgumentRef) -> &BlockArgument {
        self.get::<BlockArgument>(arg)
    }

    /// Get the arguments of `block`, in order
    #[inline]
    #[track_caller]
    pub fn arguments(&self, block: BlockRef) -> &[BlockArgumentRef] {
        self.block(block).arguments.as_slice()
    }

    /// Get the `index`th argument of `block`
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[track_caller]
    pub fn get_argument(&self, block: BlockRef, index: usize) -> BlockArgumentRef {
        let args = self.arguments(block);
        match args.get(index) {
            Some(arg) => *arg,
            None => panic!(
                "invalid argument index {index} for {block}: it only has {} arguments",
                args.len()
            ),
        }
    }

    /// Append a new argument to `block`, returning it
    pub fn add_argument(&mut self, block: BlockRef, span: SourceSpan) -> BlockArgumentRef {
        let index = self.block(block).arguments.len();
        let arg = self.allocate(BlockArgument {
            owner: block,
            index,
            span,
        });
        self.block_mut(block).arguments.push(arg);
        log::trace!(target: "cfg", "added argument {arg} (#{index}) to {block}");
        arg
    }

    /// Erase the `index`th argument of `block`.
    ///
    /// All arguments following it are shifted down by one position.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[track_caller]
    pub fn erase_argument(&mut self, block: BlockRef, index: usize) {
        let num_arguments = self.block(block).arguments.len();
        assert!(
            index < num_arguments,
            "invalid argument index {index} for {block}: it only has {num_arguments} arguments"
        );
        let arg = self.block_mut(block).arguments.remove(index);
        self.release::<BlockArgument>(arg);
        for i in index..(num_arguments - 1) {
            let arg = self.block(block).arguments[i];
            self.storage.arguments[arg].index = i;
        }
        log::trace!(target: "cfg", "erased argument {arg} (#{index}) of {block}");
    }

    /// Erase all of the arguments of `block`
    pub fn drop_all_arguments(&mut self, block: BlockRef) {
        let args = core::mem::take(&mut self.block_mut(block).arguments);
        let num_arguments = args.len();
        for arg in args {
            self.release::<BlockArgument>(arg);
        }
        log::trace!(target: "cfg", "dropped all {num_arguments} arguments of {block}");
    }
}
