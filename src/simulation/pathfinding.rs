//! Direction-constrained shortest paths over road segments
//!
//! A vehicle can't turn around mid-segment, so the search state is
//! `(segment, facing_forwards)`: facing forwards on a segment means leaving
//! through its end, and the connection's "entered by start" flag gives the
//! orientation on the next segment. Edge cost is the length of the segment
//! being entered. Segments of zero length are never entered. The search
//! graph is built per query and handed to petgraph's A* with a null
//! heuristic (i.e. Dijkstra).
//!
//! Ties between equal-cost paths are broken by heap order and are not
//! otherwise deterministic.

use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use super::types::SegmentId;

/// Connectivity queries the pathfinder needs
pub trait RoadGraph {
    /// Roads connected at the start (`at_start`) or end of `segment`, each
    /// with whether it is entered through its own start
    fn connected_roads(&self, segment: SegmentId, at_start: bool) -> Vec<(SegmentId, bool)>;

    fn segment_length(&self, segment: SegmentId) -> Option<f32>;
}

/// One segment of a path and the vehicle's orientation while on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathLeg {
    pub segment: SegmentId,
    pub facing_forwards: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoadPath {
    pub legs: Vec<PathLeg>,
    /// Sum of the lengths of every leg after the first
    pub cost: f32,
}

impl RoadPath {
    pub fn segments(&self) -> Vec<SegmentId> {
        self.legs.iter().map(|leg| leg.segment).collect()
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SearchNode {
    /// Zero-length stand-in for the start segment when looping back to it
    Surrogate,
    Leg(SegmentId, bool),
}

/// Shortest path from `start` to `target` without turning around.
///
/// Returns `None` when `start` is unknown or `target` is unreachable.
/// `start == target` yields the single-leg path.
pub fn find_path_no_turnaround(
    graph: &impl RoadGraph,
    start: SegmentId,
    target: SegmentId,
    facing_forwards_at_start: bool,
) -> Option<RoadPath> {
    graph.segment_length(start)?;
    let root = SearchNode::Leg(start, facing_forwards_at_start);
    let (cost, nodes) = search(graph, root, start, facing_forwards_at_start, target)?;

    let legs = nodes
        .into_iter()
        .filter_map(|node| match node {
            SearchNode::Leg(segment, facing_forwards) => Some(PathLeg {
                segment,
                facing_forwards,
            }),
            SearchNode::Surrogate => None,
        })
        .collect();
    Some(RoadPath { legs, cost })
}

/// Like `find_path_no_turnaround`, but when `allow_turnaround` is set and
/// `start == target`, looks for a route that leaves the segment and comes
/// back to it instead of returning the trivial path.
///
/// The loop is found by searching from a temporary surrogate node that has
/// the start segment's connections at the end the vehicle leaves through.
/// The road graph itself is never modified.
pub fn find_path(
    graph: &impl RoadGraph,
    start: SegmentId,
    target: SegmentId,
    facing_forwards_at_start: bool,
    allow_turnaround: bool,
) -> Option<RoadPath> {
    if !allow_turnaround || start != target {
        return find_path_no_turnaround(graph, start, target, facing_forwards_at_start);
    }

    graph.segment_length(start)?;
    let (cost, nodes) = search(
        graph,
        SearchNode::Surrogate,
        start,
        facing_forwards_at_start,
        target,
    )?;

    // the surrogate is always first; put the real start segment back in its place
    let legs = nodes
        .into_iter()
        .map(|node| match node {
            SearchNode::Surrogate => PathLeg {
                segment: start,
                facing_forwards: facing_forwards_at_start,
            },
            SearchNode::Leg(segment, facing_forwards) => PathLeg {
                segment,
                facing_forwards,
            },
        })
        .collect();
    Some(RoadPath { legs, cost })
}

fn search(
    graph: &impl RoadGraph,
    root: SearchNode,
    start: SegmentId,
    facing_forwards_at_start: bool,
    target: SegmentId,
) -> Option<(f32, Vec<SearchNode>)> {
    let mut states: DiGraph<SearchNode, f32> = DiGraph::new();
    let mut node_index: HashMap<SearchNode, NodeIndex> = HashMap::new();

    let root_index = states.add_node(root);
    node_index.insert(root, root_index);

    // expand every state reachable from the root
    let mut frontier = vec![root];
    while let Some(node) = frontier.pop() {
        let from = node_index[&node];
        let (segment, facing_forwards) = match node {
            SearchNode::Surrogate => (start, facing_forwards_at_start),
            SearchNode::Leg(segment, facing_forwards) => (segment, facing_forwards),
        };

        for (neighbour, entered_by_start) in graph.connected_roads(segment, !facing_forwards) {
            // zero-length segments can't be driven along
            let Some(length) = graph.segment_length(neighbour).filter(|l| *l > 0.0) else {
                continue;
            };
            let next = SearchNode::Leg(neighbour, entered_by_start);
            let to = *node_index.entry(next).or_insert_with(|| {
                frontier.push(next);
                states.add_node(next)
            });
            states.add_edge(from, to, length);
        }
    }

    let (cost, path) = astar(
        &states,
        root_index,
        |node| matches!(states[node], SearchNode::Leg(segment, _) if segment == target),
        |edge| *edge.weight(),
        |_| 0.0,
    )?;

    Some((cost, path.into_iter().map(|node| states[node]).collect()))
}
