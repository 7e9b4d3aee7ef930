use core::ops::ControlFlow;

use smallvec::{SmallVec, smallvec};

use super::Graph;
use crate::FxHashSet;

/// By implementing this trait, you can refine the traversal performed by [LazyDfsVisitor], as
/// well as hook in custom behavior to be executed upon reaching a node in both pre-order and
/// post-order visits.
///
/// If you wish to prune the search, the best place to do so is [GraphVisitor::on_node_reached],
/// as it controls whether or not the visitor will visit any of the node's successors, as well as
/// emit the node during iteration.
#[allow(unused_variables)]
pub trait GraphVisitor {
    type Node;

    /// Called when a node is first reached during a depth-first traversal, i.e. pre-order
    ///
    /// If this function returns `ControlFlow::Break`, none of `node`'s successors will be visited,
    /// and `node` will not be emitted by the visitor.
    fn on_node_reached(&mut self, from: Option<&Self::Node>, node: &Self::Node) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Called when all successors of a node have been visited, i.e. post-order.
    fn on_node_visited(&mut self, node: &Self::Node) {}
}

/// A no-op visitor for when you want the default behavior.
pub struct DefaultGraphVisitor<T>(core::marker::PhantomData<T>);
impl<T> Default for DefaultGraphVisitor<T> {
    fn default() -> Self {
        Self(core::marker::PhantomData)
    }
}
impl<T> GraphVisitor for DefaultGraphVisitor<T> {
    type Node = T;
}

/// An iterator over a depth-first traversal of nodes in a graph, producing them in pre-order.
pub struct PreOrderIter<'g, G: Graph>(LazyDfsVisitor<'g, G, DefaultGraphVisitor<G::Node>>);

impl<'g, G: Graph> PreOrderIter<'g, G> {
    /// Visit all nodes reachable from `root` in pre-order
    pub fn new(graph: &'g G, root: G::Node) -> Self {
        Self(LazyDfsVisitor::new(graph, root, DefaultGraphVisitor::default()))
    }

    /// Visit all nodes reachable from `root` in pre-order, treating the nodes in `visited` as
    /// already visited, skipping them (and their successors) during the traversal.
    pub fn new_with_visited(
        graph: &'g G,
        root: G::Node,
        visited: impl IntoIterator<Item = G::Node>,
    ) -> Self {
        Self(LazyDfsVisitor::new_with_visited(graph, root, DefaultGraphVisitor::default(), visited))
    }

    pub(crate) fn empty(graph: &'g G) -> Self {
        Self(LazyDfsVisitor::empty(graph, DefaultGraphVisitor::default()))
    }
}

impl<G: Graph> core::iter::FusedIterator for PreOrderIter<'_, G> {}
impl<G: Graph> Iterator for PreOrderIter<'_, G> {
    type Item = G::Node;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next::<false>()
    }
}

/// An iterator over a depth-first traversal of nodes in a graph, producing them in post-order.
pub struct PostOrderIter<'g, G: Graph>(LazyDfsVisitor<'g, G, DefaultGraphVisitor<G::Node>>);

impl<'g, G: Graph> PostOrderIter<'g, G> {
    /// Visit all nodes reachable from `root` in post-order
    pub fn new(graph: &'g G, root: G::Node) -> Self {
        Self(LazyDfsVisitor::new(graph, root, DefaultGraphVisitor::default()))
    }

    /// Visit all nodes reachable from `root` in post-order, treating the nodes in `visited` as
    /// already visited, skipping them (and their successors) during the traversal.
    pub fn new_with_visited(
        graph: &'g G,
        root: G::Node,
        visited: impl IntoIterator<Item = G::Node>,
    ) -> Self {
        Self(LazyDfsVisitor::new_with_visited(graph, root, DefaultGraphVisitor::default(), visited))
    }

    pub(crate) fn empty(graph: &'g G) -> Self {
        Self(LazyDfsVisitor::empty(graph, DefaultGraphVisitor::default()))
    }
}

impl<G: Graph> core::iter::FusedIterator for PostOrderIter<'_, G> {}
impl<G: Graph> Iterator for PostOrderIter<'_, G> {
    type Item = G::Node;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next::<true>()
    }
}

/// This type is an iterator over a depth-first traversal of a graph, with customization hooks
/// provided via the [GraphVisitor] trait.
///
/// The order in which nodes are produced depends on how `next` is invoked: it must be
/// instantiated with a constant boolean that indicates whether or not the iteration is to produce
/// nodes in post-order. See [PreOrderIter] and [PostOrderIter].
///
/// Successors of a node are visited in the order the graph produces them.
pub struct LazyDfsVisitor<'g, G: Graph, V> {
    graph: &'g G,
    /// The nodes we have already visited, or wish to consider visited
    visited: FxHashSet<G::Node>,
    /// The stack of discovered nodes currently being visited
    stack: SmallVec<[VisitNode<G::Node>; 8]>,
    /// A [GraphVisitor] implementation used to hook into the traversal machinery
    visitor: V,
}

/// A node which has been reached during traversal, and is in the process of being visited.
struct VisitNode<T> {
    /// The node from which this node was reached
    parent: Option<T>,
    node: T,
    /// The successors of this node which remain to be visited, in reverse order
    successors: SmallVec<[T; 2]>,
    /// Set to `true` once this node has been handled by [GraphVisitor::on_node_reached]
    reached: bool,
}

impl<'g, G, V> LazyDfsVisitor<'g, G, V>
where
    G: Graph,
    V: GraphVisitor<Node = G::Node>,
{
    /// Visit the graph rooted under `from`, using the provided visitor for customization hooks.
    pub fn new(graph: &'g G, from: G::Node, visitor: V) -> Self {
        Self::new_with_visited(graph, from, visitor, None::<G::Node>)
    }

    /// Visit the graph rooted under `from`, using the provided visitor for customization hooks.
    ///
    /// The initial set of "visited" nodes is seeded with `visited`. Any node in this set (and
    /// the nodes only reachable through it) is skipped. If `from` is in this set, the traversal
    /// is empty.
    pub fn new_with_visited(
        graph: &'g G,
        from: G::Node,
        visitor: V,
        visited: impl IntoIterator<Item = G::Node>,
    ) -> Self {
        let visited = visited.into_iter().collect::<FxHashSet<_>>();
        if visited.contains(&from) {
            return Self {
                graph,
                visited,
                stack: smallvec![],
                visitor,
            };
        }

        let successors = Self::successors_of(graph, from);
        Self {
            graph,
            visited,
            stack: smallvec![VisitNode {
                parent: None,
                node: from,
                successors,
                reached: false,
            }],
            visitor,
        }
    }

    /// A visitor with nothing to visit
    pub(crate) fn empty(graph: &'g G, visitor: V) -> Self {
        Self {
            graph,
            visited: FxHashSet::default(),
            stack: smallvec![],
            visitor,
        }
    }

    fn successors_of(graph: &G, node: G::Node) -> SmallVec<[G::Node; 2]> {
        let mut successors = graph.children(node).collect::<SmallVec<[_; 2]>>();
        successors.reverse();
        successors
    }

    /// Step the visitor forward one step.
    ///
    /// * If `POSTORDER == true`, traversal resumes until the next node that has had all of its
    ///   successors visited is on top of the visit stack.
    /// * If `POSTORDER == false`, traversal resumes until the next unvisited node is reached for
    ///   the first time.
    ///
    /// In both cases, the node found by the search is returned, or `None` once the traversal is
    /// complete.
    #[allow(clippy::should_implement_trait)]
    pub fn next<const POSTORDER: bool>(&mut self) -> Option<G::Node> {
        loop {
            let node = self.stack.last_mut()?;

            if !node.reached {
                node.reached = true;
                if !self.visited.insert(node.node) {
                    self.stack.pop();
                    continue;
                }

                let should_visit =
                    self.visitor.on_node_reached(node.parent.as_ref(), &node.node).is_continue();
                if !should_visit {
                    self.stack.pop();
                    continue;
                }

                if POSTORDER {
                    continue;
                } else {
                    break Some(node.node);
                }
            }

            // All successors visited, so we're done with this node
            let Some(successor) = node.successors.pop() else {
                let node = self.stack.pop()?;
                self.visitor.on_node_visited(&node.node);
                if POSTORDER {
                    break Some(node.node);
                } else {
                    continue;
                }
            };

            if self.visited.contains(&successor) {
                continue;
            }
            let parent = node.node;
            let successors = Self::successors_of(self.graph, successor);
            self.stack.push(VisitNode {
                parent: Some(parent),
                node: successor,
                successors,
                reached: false,
            });
        }
    }
}
