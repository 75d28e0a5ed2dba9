//! Foreign-key dependency ordering of tables

use crate::definition::TableDef;
use crate::error::{CatalogError, CatalogResult};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Order tables so every table comes after the tables it references.
///
/// Self-references are ignored. Among tables whose dependencies are all
/// satisfied, the one declared first wins, so an already-ordered
/// definition keeps its order.
pub(crate) fn order_tables(tables: &[TableDef]) -> CatalogResult<Vec<&TableDef>> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..tables.len()).map(|i| graph.add_node(i)).collect();
    let by_name: HashMap<&str, NodeIndex> = tables
        .iter()
        .zip(&nodes)
        .map(|(t, idx)| (t.name.as_str(), *idx))
        .collect();

    for (table, &node) in tables.iter().zip(&nodes) {
        let mut seen = HashSet::new();
        for column in &table.columns {
            let Some(fk) = &column.references else {
                continue;
            };
            if fk.table == table.name {
                continue;
            }
            let target = by_name
                .get(fk.table.as_str())
                .ok_or_else(|| CatalogError::UnknownTable {
                    context: format!("column '{}.{}'", table.name, column.name),
                    table: fk.table.clone(),
                })?;
            // Edge goes from dependency to dependent
            if seen.insert(*target) {
                graph.add_edge(*target, node, ());
            }
        }
    }

    if let Err(cycle) = toposort(&graph, None) {
        return Err(CatalogError::CircularReference {
            cycle: cycle_path(&graph, tables, cycle.node_id()),
        });
    }

    let mut in_degree: Vec<usize> = nodes
        .iter()
        .map(|&n| graph.edges_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut ordered = Vec::with_capacity(tables.len());
    while let Some(Reverse(i)) = ready.pop() {
        ordered.push(&tables[i]);
        for edge in graph.edges_directed(nodes[i], Direction::Outgoing) {
            let dependent = graph[edge.target()];
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }
    Ok(ordered)
}

/// Follow outgoing edges from `start` until a node repeats
fn cycle_path(graph: &DiGraph<usize, ()>, tables: &[TableDef], start: NodeIndex) -> String {
    let mut path = vec![tables[graph[start]].name.clone()];
    let mut current = start;
    let mut visited = HashSet::new();
    visited.insert(current);

    while let Some(edge) = graph.edges(current).next() {
        let target = edge.target();
        path.push(tables[graph[target]].name.clone());
        if target == start || !visited.insert(target) {
            break;
        }
        current = target;
    }

    path.join(" -> ")
}
