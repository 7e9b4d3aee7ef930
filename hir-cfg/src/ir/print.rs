use alloc::format;
use core::fmt;

use miden_formatting::prettier::{Document, PrettyPrint};

use super::*;

/// Flags which control the textual form of a [Function]
#[derive(Debug, Clone, Copy)]
pub struct PrintingFlags {
    /// Print the label of the entry block, even when it has no arguments
    pub print_entry_block_header: bool,
    /// Print the argument list of block labels
    pub print_block_arguments: bool,
}

impl Default for PrintingFlags {
    fn default() -> Self {
        Self {
            print_entry_block_header: true,
            print_block_arguments: true,
        }
    }
}

/// Printing
impl Function {
    /// Render this function as a [Document], using `flags`
    pub fn print(&self, flags: &PrintingFlags) -> Document {
        FunctionPrinter {
            function: self,
            flags,
        }
        .render()
    }

    /// Render `block`, i.e. its label, followed by one line per operation
    pub fn print_block(&self, block: BlockRef, flags: &PrintingFlags) -> Document {
        BlockPrinter {
            function: self,
            block,
            flags,
        }
        .render()
    }

    /// Get a value which displays `block` the way it is referred to as a branch destination,
    /// e.g. `^block1`
    pub fn display_block_operand(&self, block: BlockRef) -> DisplayBlockOperand {
        DisplayBlockOperand(block)
    }
}

impl PrettyPrint for Function {
    fn render(&self) -> Document {
        self.print(&PrintingFlags::default())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.pretty_print(f)
    }
}

/// Displays a block reference in operand position
#[derive(Debug, Copy, Clone)]
pub struct DisplayBlockOperand(BlockRef);

impl fmt::Display for DisplayBlockOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "^{}", self.0)
    }
}

struct FunctionPrinter<'a> {
    function: &'a Function,
    flags: &'a PrintingFlags,
}

impl PrettyPrint for FunctionPrinter<'_> {
    fn render(&self) -> Document {
        use miden_formatting::prettier::*;

        let header =
            const_text("function ") + text(format!("@{}", self.function.name())) + const_text(" {");
        if self.function.num_blocks() == 0 {
            return header + const_text("}");
        }

        self.function.blocks().fold(header, |acc, block| {
            acc + nl() + self.function.print_block(block, self.flags)
        }) + nl()
            + const_text("}")
    }
}

struct BlockPrinter<'a> {
    function: &'a Function,
    block: BlockRef,
    flags: &'a PrintingFlags,
}

impl PrettyPrint for BlockPrinter<'_> {
    fn render(&self) -> Document {
        use miden_formatting::prettier::*;

        let function = self.function;
        let args = function.arguments(self.block);
        let print_header = self.flags.print_entry_block_header
            || !function.is_entry_block(self.block)
            || (self.flags.print_block_arguments && !args.is_empty());

        let body = function.ops(self.block).fold(Document::Empty, |acc, op| {
            let op = function.op(op);
            let successors =
                op.successors().iter().enumerate().fold(Document::Empty, |acc, (i, edge)| {
                    let dest = display(function.display_block_operand(function.edge(*edge).block()));
                    if i > 0 {
                        acc + const_text(", ") + dest
                    } else {
                        const_text(" ") + dest
                    }
                });
            acc + nl() + text(op.name()) + successors + const_text(";")
        });

        if !print_header {
            return indent(4, body);
        }

        let label = text(format!("^{}", self.block));
        let label = if self.flags.print_block_arguments && !args.is_empty() {
            let args = args.iter().enumerate().fold(const_text("("), |acc, (i, arg)| {
                let arg = text(format!("%{arg}"));
                if i > 0 {
                    acc + const_text(", ") + arg
                } else {
                    acc + arg
                }
            });
            label + args + const_text(")")
        } else {
            label
        };

        label + const_text(":") + indent(4, body)
    }
}
