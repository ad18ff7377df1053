//! Task dependency graph construction (Kahn's algorithm).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{PlannerError, Result};
use crate::models::{Dependency, DependencyType, Task};

/// Adjacency view over a plan's tasks and dependency edges, with a
/// deterministic topological order (ties broken by ascending task id).
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// Task ids in topological order
    pub topo_order: Vec<String>,
    successors: HashMap<String, Vec<String>>,
    predecessors: HashMap<String, Vec<String>>,
    edge_types: HashMap<(String, String), DependencyType>,
    /// Edges dropped during a lenient build because they closed a cycle
    pub excluded_edges: Vec<Dependency>,
}

impl TaskGraph {
    /// Builds the graph, failing with [`PlannerError::CycleDetected`] when
    /// the edge set is not a DAG.
    pub fn build(tasks: &[Task], dependencies: &[Dependency]) -> Result<Self> {
        let graph = Self::assemble(tasks, dependencies);
        match graph.kahn() {
            Ok(order) => Ok(Self {
                topo_order: order,
                ..graph
            }),
            Err(residual) => Err(PlannerError::CycleDetected {
                node_ids: residual,
            }),
        }
    }

    /// Builds the graph for analytical reads: edges that close a cycle are
    /// excluded (deterministically, in sorted edge order) and reported in
    /// `excluded_edges` instead of failing the load.
    pub fn build_lenient(tasks: &[Task], dependencies: &[Dependency]) -> Self {
        match Self::build(tasks, dependencies) {
            Ok(graph) => graph,
            Err(_) => {
                let mut sorted: Vec<Dependency> = dependencies.to_vec();
                sorted.sort_by(|a, b| {
                    (&a.predecessor_id, &a.successor_id)
                        .cmp(&(&b.predecessor_id, &b.successor_id))
                });

                let mut kept: Vec<Dependency> = Vec::with_capacity(sorted.len());
                let mut excluded = Vec::new();
                for dep in sorted {
                    kept.push(dep.clone());
                    if Self::assemble(tasks, &kept).kahn().is_err() {
                        kept.pop();
                        excluded.push(dep);
                    }
                }
                for edge in &excluded {
                    log::warn!(
                        "plan {}: excluding cyclic dependency {} -> {}",
                        edge.plan_id,
                        edge.predecessor_id,
                        edge.successor_id
                    );
                }
                let mut graph = Self::assemble(tasks, &kept);
                // kept is acyclic by construction
                graph.topo_order = graph.kahn().unwrap_or_default();
                graph.excluded_edges = excluded;
                graph
            }
        }
    }

    fn assemble(tasks: &[Task], dependencies: &[Dependency]) -> Self {
        let ids: HashSet<&str> = tasks.iter().map(|t| t.task_id.as_str()).collect();

        let mut successors: HashMap<String, Vec<String>> = HashMap::new();
        let mut predecessors: HashMap<String, Vec<String>> = HashMap::new();
        let mut edge_types = HashMap::new();
        for task in tasks {
            successors.insert(task.task_id.clone(), Vec::new());
            predecessors.insert(task.task_id.clone(), Vec::new());
        }

        // Edges referencing tasks outside the plan are ignored; both ends
        // must exist in the snapshot.
        for dep in dependencies {
            if !ids.contains(dep.predecessor_id.as_str())
                || !ids.contains(dep.successor_id.as_str())
            {
                continue;
            }
            if let Some(list) = successors.get_mut(&dep.predecessor_id) {
                if !list.contains(&dep.successor_id) {
                    list.push(dep.successor_id.clone());
                }
            }
            if let Some(list) = predecessors.get_mut(&dep.successor_id) {
                if !list.contains(&dep.predecessor_id) {
                    list.push(dep.predecessor_id.clone());
                }
            }
            edge_types.insert(
                (dep.predecessor_id.clone(), dep.successor_id.clone()),
                dep.dep_type,
            );
        }

        for list in successors.values_mut().chain(predecessors.values_mut()) {
            list.sort();
        }

        Self {
            topo_order: Vec::new(),
            successors,
            predecessors,
            edge_types,
            excluded_edges: Vec::new(),
        }
    }

    // Kahn's algorithm over a BTreeSet ready queue for id-sorted determinism.
    // Err carries the residual (on-cycle) node ids.
    fn kahn(&self) -> std::result::Result<Vec<String>, Vec<String>> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .predecessors
            .iter()
            .map(|(id, preds)| (id.as_str(), preds.len()))
            .collect();

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(&next) = ready.iter().next() {
            ready.remove(next);
            order.push(next.to_string());
            if let Some(successors) = self.successors.get(next) {
                for succ in successors {
                    let degree = in_degree.entry(succ.as_str()).or_insert(0);
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.insert(succ.as_str());
                    }
                }
            }
        }

        if order.len() == in_degree.len() {
            Ok(order)
        } else {
            let on_order: HashSet<&str> = order.iter().map(String::as_str).collect();
            let residual = in_degree
                .keys()
                .filter(|id| !on_order.contains(**id))
                .map(|id| id.to_string())
                .collect();
            Err(residual)
        }
    }

    /// Direct successors of a task, id-sorted.
    pub fn successors(&self, task_id: &str) -> &[String] {
        self.successors.get(task_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct predecessors of a task, id-sorted.
    pub fn predecessors(&self, task_id: &str) -> &[String] {
        self.predecessors
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the task is part of the graph.
    pub fn contains(&self, task_id: &str) -> bool {
        self.successors.contains_key(task_id)
    }

    /// Scheduling semantics of an edge; absent edges read as finish-to-start.
    pub fn edge_type(&self, predecessor: &str, successor: &str) -> DependencyType {
        self.edge_types
            .get(&(predecessor.to_string(), successor.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Transitive successor closure of a task (excluding the task itself),
    /// sorted by id.
    pub fn downstream_closure(&self, task_id: &str) -> Vec<String> {
        self.closure(task_id, |graph, id| graph.successors(id))
    }

    /// Transitive predecessor closure of a task (excluding the task itself),
    /// sorted by id.
    pub fn upstream_closure(&self, task_id: &str) -> Vec<String> {
        self.closure(task_id, |graph, id| graph.predecessors(id))
    }

    fn closure<'a>(
        &'a self,
        task_id: &str,
        neighbors: impl Fn(&'a Self, &str) -> &'a [String],
    ) -> Vec<String> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut stack: Vec<&str> = vec![task_id];
        while let Some(current) = stack.pop() {
            for next in neighbors(self, current) {
                if seen.insert(next.as_str()) {
                    stack.push(next.as_str());
                }
            }
        }
        seen.remove(task_id);
        seen.into_iter().map(String::from).collect()
    }

    /// Whether adding `predecessor -> successor` would close a directed
    /// cycle, checked by a DFS from the successor back to the predecessor.
    pub fn would_create_cycle(&self, predecessor: &str, successor: &str) -> bool {
        if predecessor == successor {
            return true;
        }
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![successor];
        while let Some(current) = stack.pop() {
            if current == predecessor {
                return true;
            }
            for next in self.successors(current) {
                if seen.insert(next.as_str()) {
                    stack.push(next.as_str());
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{dep, task};

    #[test]
    fn topological_order_breaks_ties_by_id() {
        let tasks = vec![task("t3"), task("t1"), task("t2")];
        let graph = TaskGraph::build(&tasks, &[]).unwrap();
        assert_eq!(graph.topo_order, vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn chain_orders_by_dependency() {
        let tasks = vec![task("t1"), task("t2"), task("t3")];
        let deps = vec![dep("t2", "t3"), dep("t1", "t2")];
        let graph = TaskGraph::build(&tasks, &deps).unwrap();
        assert_eq!(graph.topo_order, vec!["t1", "t2", "t3"]);
        assert_eq!(graph.successors("t1"), ["t2"]);
        assert_eq!(graph.predecessors("t3"), ["t2"]);
    }

    #[test]
    fn isolated_tasks_keep_id_order() {
        let tasks = vec![task("b"), task("a"), task("c"), task("d")];
        let deps = vec![dep("c", "a")];
        let graph = TaskGraph::build(&tasks, &deps).unwrap();
        // a is held back until c releases it
        assert_eq!(graph.topo_order, vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn cycle_is_detected_with_members() {
        let tasks = vec![task("t1"), task("t2"), task("t3")];
        let deps = vec![dep("t1", "t2"), dep("t2", "t3"), dep("t3", "t1")];
        let err = TaskGraph::build(&tasks, &deps).unwrap_err();
        match err {
            PlannerError::CycleDetected { node_ids } => {
                assert_eq!(node_ids, vec!["t1", "t2", "t3"]);
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
    }

    #[test]
    fn lenient_build_excludes_cycle_edge() {
        let tasks = vec![task("t1"), task("t2"), task("t3")];
        let deps = vec![dep("t1", "t2"), dep("t2", "t3"), dep("t3", "t1")];
        let graph = TaskGraph::build_lenient(&tasks, &deps);
        assert_eq!(graph.topo_order.len(), 3);
        assert_eq!(graph.excluded_edges.len(), 1);
        assert_eq!(graph.excluded_edges[0].predecessor_id, "t3");
        assert_eq!(graph.excluded_edges[0].successor_id, "t1");
    }

    #[test]
    fn closures_are_transitive() {
        let tasks = vec![task("t1"), task("t2"), task("t3"), task("t4")];
        let deps = vec![dep("t1", "t2"), dep("t2", "t3"), dep("t2", "t4")];
        let graph = TaskGraph::build(&tasks, &deps).unwrap();
        assert_eq!(graph.downstream_closure("t1"), ["t2", "t3", "t4"]);
        assert_eq!(graph.upstream_closure("t4"), ["t1", "t2"]);
        assert!(graph.downstream_closure("t3").is_empty());
    }

    #[test]
    fn cycle_precheck() {
        let tasks = vec![task("t1"), task("t2"), task("t3")];
        let deps = vec![dep("t1", "t2"), dep("t2", "t3")];
        let graph = TaskGraph::build(&tasks, &deps).unwrap();
        assert!(graph.would_create_cycle("t3", "t1"));
        assert!(graph.would_create_cycle("t1", "t1"));
        assert!(!graph.would_create_cycle("t1", "t3"));
    }
}
