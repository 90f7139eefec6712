//! Reference Graph Analysis
//!
//! Builds the same-document `$ref` graph and finds strongly connected
//! components. A component whose members only point at each other can
//! never reach a concrete schema; the resolver turns such chains into the
//! `false` schema, and the loader reports them here so schema authors see
//! the problem at load time rather than as unexplained validation failures.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use super::{NodeId, SchemaNode};

/// Find `$ref` cycles among a document's nodes. Each cycle is returned as
/// the sorted JSON Pointers of its members.
pub(crate) fn find_ref_cycles(
    nodes: &[SchemaNode],
    id_index: &HashMap<String, NodeId>,
) -> Vec<Vec<String>> {
    let mut graph: DiGraph<NodeId, ()> = DiGraph::new();
    let mut indices: HashMap<NodeId, NodeIndex> = HashMap::new();

    let mut index_of = |graph: &mut DiGraph<NodeId, ()>, id: NodeId| {
        *indices.entry(id).or_insert_with(|| graph.add_node(id))
    };

    for (position, node) in nodes.iter().enumerate() {
        let Some(reference) = &node.reference else { continue };
        // only ref-to-ref edges can form a chain that never terminates
        let Some(&target) = id_index.get(reference) else { continue };
        if nodes[target.index()].reference.is_none() {
            continue;
        }
        let from = index_of(&mut graph, NodeId(position));
        let to = index_of(&mut graph, target);
        graph.add_edge(from, to, ());
    }

    let mut cycles: Vec<Vec<String>> = kosaraju_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut pointers: Vec<String> = scc
                .into_iter()
                .filter_map(|idx| graph.node_weight(idx))
                .map(|id| nodes[id.index()].pointer.clone())
                .collect();
            pointers.sort();
            pointers
        })
        .collect();
    cycles.sort();
    cycles
}
