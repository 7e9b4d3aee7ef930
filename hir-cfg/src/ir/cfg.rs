mod visit;

use alloc::vec::Vec;
use core::iter::Copied;

pub use self::visit::{
    DefaultGraphVisitor, GraphVisitor, LazyDfsVisitor, PostOrderIter, PreOrderIter,
};
use super::*;

/// This is an abstraction over graph-like structures used in the IR, chiefly the control-flow
/// graph of a [Function].
///
/// Nodes and edges are cheap, copyable handles into the graph, so querying the graph structure
/// always goes through a reference to the graph itself.
pub trait Graph {
    /// The type of node represented in the graph.
    type Node: Copy + Eq + core::hash::Hash;
    /// Type used to iterate over children of a node in the graph.
    type ChildIter<'a>: ExactSizeIterator<Item = Self::Node>
    where
        Self: 'a;
    /// The type used to represent an edge in the graph.
    type Edge: Copy;
    /// Type used to iterate over child edges of a node in the graph.
    type ChildEdgeIter<'a>: ExactSizeIterator<Item = Self::Edge>
    where
        Self: 'a;

    /// An empty graph has no nodes.
    #[inline]
    fn is_empty(&self) -> bool {
        self.size() == 0
    }
    /// Get the number of nodes in this graph
    fn size(&self) -> usize;
    /// Get the entry node of the graph.
    ///
    /// It is expected that a graph always has an entry. As such, this function will panic if
    /// called on an "empty" graph.
    fn entry_node(&self) -> Self::Node;
    /// Get an iterator over the children of `parent`
    fn children(&self, parent: Self::Node) -> Self::ChildIter<'_>;
    /// Get an iterator over the children edges of `parent`
    fn children_edges(&self, parent: Self::Node) -> Self::ChildEdgeIter<'_>;
    /// Return the destination node of an edge.
    fn edge_dest(&self, edge: Self::Edge) -> Self::Node;
}

/// An [InvertibleGraph] is a [Graph] which can be "inverted", i.e. edges are reversed.
///
/// For a CFG, the inversion visits predecessors instead of successors, which is what e.g. a
/// post-dominator analysis or a backwards dataflow analysis needs.
///
/// This is primarily consumed via [Inverse].
pub trait InvertibleGraph: Graph {
    /// The type of iterator used to visit "inverted" children of a node in this graph, i.e.
    /// the predecessors.
    type InvertibleChildIter<'a>: ExactSizeIterator<Item = Self::Node>
    where
        Self: 'a;
    /// The type of iterator used to obtain the set of "inverted" children edges of a node in this
    /// graph, i.e. the predecessor edges.
    type InvertibleChildEdgeIter<'a>: ExactSizeIterator<Item = Self::Edge>
    where
        Self: 'a;

    /// Get an iterator over the predecessors of `parent`.
    ///
    /// NOTE: `parent` in this case will actually be a child of the nodes in the iterator, but we
    /// preserve the naming so as to make it apparent we are working with an inversion of the
    /// original graph.
    fn inverse_children(&self, parent: Self::Node) -> Self::InvertibleChildIter<'_>;
    /// Get an iterator over the predecessor edges of `parent`.
    fn inverse_children_edges(&self, parent: Self::Node) -> Self::InvertibleChildEdgeIter<'_>;
    /// Return the source node of an edge.
    fn edge_source(&self, edge: Self::Edge) -> Self::Node;

    /// Obtain the inversion of this graph
    fn inverse(&self) -> Inverse<'_, Self>
    where
        Self: Sized,
    {
        Inverse::new(self)
    }
}

/// This is a wrapper type for [InvertibleGraph] implementations, used to indicate that a graph
/// should be traversed along its inverted edges.
///
/// The entry node of the inversion is the entry node of the underlying graph, so a traversal of
/// an inverted CFG should generally be started explicitly from an exit node instead.
pub struct Inverse<'g, G> {
    graph: &'g G,
}

impl<'g, G> Inverse<'g, G> {
    /// Construct an inversion over `graph`
    #[inline]
    pub fn new(graph: &'g G) -> Self {
        Self { graph }
    }

    /// Get the underlying graph
    #[inline(always)]
    pub fn graph(&self) -> &'g G {
        self.graph
    }
}

impl<G: InvertibleGraph> Graph for Inverse<'_, G> {
    type ChildEdgeIter<'a>
        = G::InvertibleChildEdgeIter<'a>
    where
        Self: 'a;
    type ChildIter<'a>
        = G::InvertibleChildIter<'a>
    where
        Self: 'a;
    type Edge = G::Edge;
    type Node = G::Node;

    fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    fn size(&self) -> usize {
        self.graph.size()
    }

    fn entry_node(&self) -> Self::Node {
        self.graph.entry_node()
    }

    fn children(&self, parent: Self::Node) -> Self::ChildIter<'_> {
        self.graph.inverse_children(parent)
    }

    fn children_edges(&self, parent: Self::Node) -> Self::ChildEdgeIter<'_> {
        self.graph.inverse_children_edges(parent)
    }

    fn edge_dest(&self, edge: Self::Edge) -> Self::Node {
        self.graph.edge_source(edge)
    }
}

impl<G: InvertibleGraph> InvertibleGraph for Inverse<'_, G> {
    type InvertibleChildEdgeIter<'a>
        = G::ChildEdgeIter<'a>
    where
        Self: 'a;
    type InvertibleChildIter<'a>
        = G::ChildIter<'a>
    where
        Self: 'a;

    fn inverse_children(&self, parent: Self::Node) -> Self::InvertibleChildIter<'_> {
        self.graph.children(parent)
    }

    fn inverse_children_edges(&self, parent: Self::Node) -> Self::InvertibleChildEdgeIter<'_> {
        self.graph.children_edges(parent)
    }

    fn edge_source(&self, edge: Self::Edge) -> Self::Node {
        self.graph.edge_dest(edge)
    }
}

impl Graph for Function {
    type ChildEdgeIter<'a> = Copied<core::slice::Iter<'a, BlockOperandRef>>;
    type ChildIter<'a> = SuccessorIter<'a>;
    type Edge = BlockOperandRef;
    type Node = BlockRef;

    fn size(&self) -> usize {
        self.num_blocks()
    }

    #[track_caller]
    fn entry_node(&self) -> Self::Node {
        match self.entry_block() {
            Some(entry) => entry,
            None => panic!("@{} has no entry block", self.name()),
        }
    }

    fn children(&self, parent: Self::Node) -> Self::ChildIter<'_> {
        self.successor_blocks(parent)
    }

    fn children_edges(&self, parent: Self::Node) -> Self::ChildEdgeIter<'_> {
        self.successors(parent).iter().copied()
    }

    fn edge_dest(&self, edge: Self::Edge) -> Self::Node {
        self.edge(edge).block()
    }
}

impl InvertibleGraph for Function {
    type InvertibleChildEdgeIter<'a> = PredecessorEdgeIter<'a>;
    type InvertibleChildIter<'a> = PredecessorIter<'a>;

    fn inverse_children(&self, parent: Self::Node) -> Self::InvertibleChildIter<'_> {
        self.predecessors(parent)
    }

    fn inverse_children_edges(&self, parent: Self::Node) -> Self::InvertibleChildEdgeIter<'_> {
        self.predecessor_edges(parent)
    }

    fn edge_source(&self, edge: Self::Edge) -> Self::Node {
        self.op(self.edge(edge).owner()).parent()
    }
}

/// Traversal
impl Function {
    /// Visit the blocks reachable from the entry block in depth-first pre-order
    pub fn preorder(&self) -> PreOrderIter<'_, Self> {
        match self.entry_block() {
            Some(entry) => PreOrderIter::new(self, entry),
            None => PreOrderIter::empty(self),
        }
    }

    /// Visit the blocks reachable from the entry block in depth-first post-order
    pub fn postorder(&self) -> PostOrderIter<'_, Self> {
        match self.entry_block() {
            Some(entry) => PostOrderIter::new(self, entry),
            None => PostOrderIter::empty(self),
        }
    }

    /// Get the blocks reachable from the entry block in reverse post-order, i.e. every block comes
    /// before its successors, ignoring back edges.
    pub fn reverse_postorder(&self) -> Vec<BlockRef> {
        let mut blocks = self.postorder().collect::<Vec<_>>();
        blocks.reverse();
        blocks
    }
}
