//! Directed dependency graph with build-order computation
//!
//! Edges point from a dependent to its dependency (`add_edge(top, sub)`).
//! The same structure is used for block-level requirements (nodes are
//! block titles at a version) and for unit-level build order (nodes are
//! HDL units owned by blocks).

use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Circular dependency detected among: {0}")]
    CircularDependency(String),

    #[error("No usable build unit found; try adding an HDL file to the current block")]
    NoBuildUnit,
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Result of a topological sort.
#[derive(Debug, Clone, PartialEq)]
pub struct TopoOrder<N, B> {
    /// Every vertex, dependencies before dependents.
    pub order: Vec<N>,
    /// Owners of the vertices in first-seen order; the owner of the last
    /// vertex in `order` is always last.
    pub block_order: Vec<B>,
}

/// Adjacency-list graph keyed by structural equality of `N`.
#[derive(Debug, Clone)]
pub struct DependencyGraph<N> {
    /// Insertion order of vertices, for deterministic iteration.
    vertices: Vec<N>,
    /// vertex -> its dependencies
    adj: HashMap<N, Vec<N>>,
    /// vertex -> vertices that depend on it
    rev: HashMap<N, Vec<N>>,
}

impl<N> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            adj: HashMap::new(),
            rev: HashMap::new(),
        }
    }
}

impl<N: Clone + Eq + Hash> DependencyGraph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.adj.clear();
        self.rev.clear();
    }

    /// Add a vertex if it does not exist yet.
    pub fn add_vertex(&mut self, v: N) {
        if !self.adj.contains_key(&v) {
            self.vertices.push(v.clone());
            self.adj.insert(v.clone(), Vec::new());
            self.rev.insert(v, Vec::new());
        }
    }

    /// Record that `from` depends on `to`. Missing vertices are added and
    /// an existing edge is not duplicated.
    pub fn add_edge(&mut self, from: N, to: N) {
        self.add_vertex(from.clone());
        self.add_vertex(to.clone());

        if let Some(deps) = self.adj.get_mut(&from) {
            if !deps.contains(&to) {
                deps.push(to.clone());
            }
        }
        if let Some(users) = self.rev.get_mut(&to) {
            if !users.contains(&from) {
                users.push(from);
            }
        }
    }

    /// Remove a vertex and every edge touching it.
    pub fn remove_vertex(&mut self, v: &N) {
        if self.adj.remove(v).is_none() {
            return;
        }
        self.rev.remove(v);
        self.vertices.retain(|x| x != v);
        for deps in self.adj.values_mut() {
            deps.retain(|x| x != v);
        }
        for users in self.rev.values_mut() {
            users.retain(|x| x != v);
        }
    }

    pub fn remove_edge(&mut self, from: &N, to: &N) {
        if let Some(deps) = self.adj.get_mut(from) {
            deps.retain(|x| x != to);
        }
        if let Some(users) = self.rev.get_mut(to) {
            users.retain(|x| x != from);
        }
    }

    /// Dependencies of `v`, or with `upstream` the vertices depending on `v`.
    pub fn neighbors(&self, v: &N, upstream: bool) -> Vec<N> {
        let map = if upstream { &self.rev } else { &self.adj };
        map.get(v).cloned().unwrap_or_default()
    }

    pub fn vertices(&self) -> &[N] {
        &self.vertices
    }

    pub fn contains(&self, v: &N) -> bool {
        self.adj.contains_key(v)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Kahn-style build order.
    ///
    /// Each vertex starts with a count of the dependencies it still needs;
    /// vertices at zero are peeled off in insertion order and the count of
    /// everything depending on them drops by one. `owner` maps a vertex to
    /// the block that owns it.
    pub fn topological_sort<B, F>(&self, owner: F) -> GraphResult<TopoOrder<N, B>>
    where
        B: Clone + PartialEq,
        F: Fn(&N) -> B,
    {
        let mut remaining: HashMap<&N, usize> = self
            .vertices
            .iter()
            .map(|v| (v, self.adj.get(v).map_or(0, Vec::len)))
            .collect();

        let mut order: Vec<N> = Vec::with_capacity(self.vertices.len());
        let mut block_order: Vec<B> = Vec::new();

        while order.len() < self.vertices.len() {
            let ready: Vec<&N> = self
                .vertices
                .iter()
                .filter(|v| remaining.get(v) == Some(&0))
                .collect();

            if ready.is_empty() {
                let stuck = remaining
                    .values()
                    .filter(|count| **count != usize::MAX)
                    .count();
                return Err(GraphError::CircularDependency(format!(
                    "{} vertices never became ready",
                    stuck
                )));
            }

            for v in ready {
                order.push(v.clone());
                let b = owner(v);
                if !block_order.contains(&b) {
                    block_order.push(b);
                }
                // sentinel so the vertex is not picked again
                remaining.insert(v, usize::MAX);
                for user in self.rev.get(v).into_iter().flatten() {
                    if let Some(count) = remaining.get_mut(user) {
                        if *count != usize::MAX && *count > 0 {
                            *count -= 1;
                        }
                    }
                }
            }
        }

        let Some(last) = order.last() else {
            return Err(GraphError::NoBuildUnit);
        };

        let current = owner(last);
        block_order.retain(|b| *b != current);
        block_order.push(current);

        Ok(TopoOrder { order, block_order })
    }

    /// Render the dependency tree below `top` with ASCII branch art.
    ///
    /// Vertices for which `aggregate` returns true (packages) are not
    /// drawn but their dependencies still are.
    pub fn render_tree<A, L>(&self, top: &N, aggregate: A, label: L) -> String
    where
        A: Fn(&N) -> bool,
        L: Fn(&N) -> String,
    {
        let mut out = String::from("--- DEPENDENCY TREE ---\n");
        if !self.contains(top) {
            return out;
        }
        let mut path = Vec::new();
        self.render_node(top, "", true, true, &aggregate, &label, &mut path, &mut out);
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn render_node<A, L>(
        &self,
        node: &N,
        prefix: &str,
        last: bool,
        root: bool,
        aggregate: &A,
        label: &L,
        path: &mut Vec<N>,
        out: &mut String,
    ) where
        A: Fn(&N) -> bool,
        L: Fn(&N) -> String,
    {
        // A cycle would otherwise recurse forever.
        if path.contains(node) {
            return;
        }

        let drawn = !aggregate(node);
        let child_prefix = if drawn {
            if root {
                out.push_str(&format!("\\- {}\n", label(node)));
                "   ".to_string()
            } else {
                let branch = if last { "\\-" } else { "+-" };
                out.push_str(&format!("{}{} {}\n", prefix, branch, label(node)));
                format!("{}{}  ", prefix, if last { " " } else { "|" })
            }
        } else {
            prefix.to_string()
        };

        path.push(node.clone());
        let children = self.neighbors(node, false);
        let count = children.len();
        for (i, child) in children.iter().enumerate() {
            let child_last = if drawn { i + 1 == count } else { last && i + 1 == count };
            self.render_node(
                child,
                &child_prefix,
                child_last,
                root && !drawn,
                aggregate,
                label,
                path,
                out,
            );
        }
        path.pop();
    }
}
