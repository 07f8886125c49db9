//! Task dependency graph
//!
//! Nodes are task ids and an edge `a -> b` means `b` reads the output of
//! `a`. The graph is validated once when the crew is built, so kickoff can
//! rely on every upstream output existing before a task starts.

use crate::{CrewError, Result, TaskContext, TaskId, TaskSpec};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::fmt;

/// How a dependency came about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// Named in the task's context
    Explicit,
    /// Task left its context implicit and reads every earlier task
    Implicit,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Explicit => write!(f, "explicit"),
            DependencyKind::Implicit => write!(f, "implicit"),
        }
    }
}

/// Validated dependencies between a crew's tasks
#[derive(Debug, Clone)]
pub struct TaskGraph {
    graph: DiGraph<TaskId, DependencyKind>,
    index: HashMap<TaskId, NodeIndex>,
    order: Vec<TaskId>,
    upstream: HashMap<TaskId, Vec<TaskId>>,
}

impl TaskGraph {
    /// Build and validate the graph for tasks listed in execution order
    ///
    /// # Errors
    /// - [`CrewError::DuplicateTask`] when two tasks share an id
    /// - [`CrewError::UnknownDependency`] when a context names a missing task
    /// - [`CrewError::DependencyCycle`] when dependencies loop
    /// - [`CrewError::DependencyOrder`] when a task reads a later task
    pub fn from_tasks(tasks: &[TaskSpec]) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut order = Vec::with_capacity(tasks.len());

        for task in tasks {
            if index.contains_key(task.id()) {
                return Err(CrewError::DuplicateTask(task.id().clone()));
            }
            let node = graph.add_node(task.id().clone());
            index.insert(task.id().clone(), node);
            order.push(task.id().clone());
        }

        let mut upstream = HashMap::new();
        for (position, task) in tasks.iter().enumerate() {
            let (deps, kind) = match task.context() {
                TaskContext::Explicit(ids) => (ids.clone(), DependencyKind::Explicit),
                TaskContext::Implicit => (order[..position].to_vec(), DependencyKind::Implicit),
            };

            for dep in &deps {
                let from = index.get(dep).ok_or_else(|| CrewError::UnknownDependency {
                    task: task.id().clone(),
                    dependency: dep.clone(),
                })?;
                graph.update_edge(*from, index[task.id()], kind);
            }
            upstream.insert(task.id().clone(), deps);
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(CrewError::DependencyCycle(graph[cycle.node_id()].clone()));
        }

        for (position, task) in tasks.iter().enumerate() {
            for dep in &upstream[task.id()] {
                let dep_position = index[dep].index();
                if dep_position >= position {
                    return Err(CrewError::DependencyOrder {
                        task: task.id().clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        Ok(Self {
            graph,
            index,
            order,
            upstream,
        })
    }

    /// Tasks whose output `id` reads, in declaration order
    pub fn upstream(&self, id: &TaskId) -> &[TaskId] {
        self.upstream.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// How `to` came to depend on `from`, if it does
    pub fn dependency_kind(&self, from: &TaskId, to: &TaskId) -> Option<DependencyKind> {
        let from = self.index.get(from)?;
        let to = self.index.get(to)?;
        let edge = self.graph.find_edge(*from, *to)?;
        self.graph.edge_weight(edge).copied()
    }

    /// Order tasks run in under the sequential process
    pub fn execution_order(&self) -> &[TaskId] {
        &self.order
    }
}
