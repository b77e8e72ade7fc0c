//! Census of simple cycles over synchronous links
//!
//! Enumerates each simple cycle once, from its first member in SCC order, and
//! only counts: no cycle is materialized. Built lazily next to the graph index
//! and dropped with it, so every evaluation of an unchanged system shares one
//! enumeration.

use super::System;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Number of synchronous cycles, in total and per component on them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleCensus {
    total: usize,
    through: BTreeMap<String, usize>,
}

impl CycleCensus {
    pub fn total(&self) -> usize {
        self.total
    }

    /// Cycles the component lies on
    pub fn through(&self, component_id: &str) -> usize {
        self.through.get(component_id).copied().unwrap_or(0)
    }

    pub(super) fn build(system: &System) -> Self {
        let mut census = CycleCensus::default();

        for group in system.strongly_connected_components() {
            let positions: BTreeMap<&str, usize> = group
                .iter()
                .enumerate()
                .map(|(i, id)| (id.as_str(), i))
                .collect();

            // member position -> positions reachable over one synchronous link (one entry per link)
            let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); group.len()];
            for (position, id) in group.iter().enumerate() {
                let Ok(links) = system.get_outgoing_links_of_component(id) else {
                    continue;
                };
                for link in links {
                    let Ok(endpoint) = system.target_endpoint_of_link(link) else {
                        continue;
                    };
                    if endpoint.kind.is_asynchronous() {
                        continue;
                    }
                    let Ok(target) = system.target_component_of_link(link) else {
                        continue;
                    };
                    if let Some(&next) = positions.get(target.id.as_str()) {
                        adjacency[position].push(next);
                    }
                }
            }

            let mut counts = vec![0usize; group.len()];
            for start in 0..group.len() {
                let mut search = Search {
                    start,
                    adjacency: &adjacency,
                    path: Vec::new(),
                    on_path: HashSet::new(),
                    counts: &mut counts,
                    total: 0,
                };
                search.visit(start);
                census.total += search.total;
            }

            for (id, count) in group.iter().zip(counts) {
                if count > 0 {
                    census.through.insert(id.clone(), count);
                }
            }
        }

        debug!(
            "Counted {} synchronous cycles over {} components",
            census.total,
            census.through.len()
        );
        census
    }
}

struct Search<'a> {
    start: usize,
    adjacency: &'a [Vec<usize>],
    path: Vec<usize>,
    on_path: HashSet<usize>,
    counts: &'a mut [usize],
    total: usize,
}

impl Search<'_> {
    /// DFS over members after `start`, so each cycle is counted from its first member only
    fn visit(&mut self, node: usize) {
        self.path.push(node);
        self.on_path.insert(node);
        let adjacency = self.adjacency;
        for &next in &adjacency[node] {
            if next == self.start {
                self.total += 1;
                for &member in &self.path {
                    self.counts[member] += 1;
                }
            } else if next > self.start && !self.on_path.contains(&next) {
                self.visit(next);
            }
        }
        self.on_path.remove(&node);
        self.path.pop();
    }
}
