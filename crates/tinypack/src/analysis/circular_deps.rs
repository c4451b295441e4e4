//! Circular dependency report
//!
//! Cycles are legal: the runtime caches a module before running its factory,
//! so a module re-entered mid-cycle hands out its partially populated
//! exports. The report exists for diagnostics only and never fails a build.

use petgraph::{
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
};

use crate::module_registry::{ModuleId, ModuleTable};

/// Group of modules that import each other, ids ascending
pub type Cycle = Vec<ModuleId>;

/// Find every strongly connected component of the module graph that forms a
/// cycle: components with more than one module, plus modules that import
/// themselves.
///
/// The result is deterministic. Each cycle lists its ids in ascending order
/// and cycles are ordered by their smallest id.
pub fn find_cycles(table: &ModuleTable) -> Vec<Cycle> {
    let graph = dependency_graph(table);

    let mut cycles: Vec<Cycle> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| match component.as_slice() {
            [single] => graph.contains_edge(*single, *single),
            _ => true,
        })
        .map(|component| {
            let mut ids: Cycle = component.into_iter().map(|idx| graph[idx]).collect();
            ids.sort_unstable();
            ids
        })
        .collect();

    cycles.sort_unstable_by_key(|cycle| cycle.first().copied());
    cycles
}

/// Directed graph with one node per module; node index equals module id
fn dependency_graph(table: &ModuleTable) -> DiGraph<ModuleId, ()> {
    let mut graph = DiGraph::with_capacity(table.len(), 0);
    for module in table.iter() {
        graph.add_node(module.id);
    }

    for module in table.iter() {
        let from = NodeIndex::new(module.id.index());
        for (_, to) in table.dependency_ids(module) {
            if let Some(to) = to
                && !graph.contains_edge(from, NodeIndex::new(to.index()))
            {
                graph.add_edge(from, NodeIndex::new(to.index()), ());
            }
        }
    }
    graph
}
