//! Dependency graph over a fixed package snapshot.
//!
//! Edges are kept as forward and reverse adjacency maps keyed by package
//! name. Orderings are computed with Kahn's algorithm and are fully
//! materialized: a cyclic snapshot fails before any package is returned.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use petgraph::algo::tarjan_scc;
use petgraph::dot::{Config as DotConfig, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{Error, Result};
use crate::package::{normalize_name, Package};
use crate::registry::PackageRegistry;

/// Directed graph of workspace dependencies.
///
/// An edge `a -> b` means `a` depends on `b`. Declared dependencies that do
/// not resolve to a package in the snapshot are dropped silently.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    packages: IndexMap<String, Arc<Package>>,
    lookup: HashMap<String, String>,
    edges: IndexMap<String, IndexSet<String>>,
    reverse_edges: IndexMap<String, IndexSet<String>>,
}

impl DependencyGraph {
    /// Builds a graph from a package snapshot.
    pub fn new(packages: impl IntoIterator<Item = Package>) -> Self {
        Self::from_shared(packages.into_iter().map(Arc::new))
    }

    /// Builds a graph over the packages of a registry.
    pub fn from_registry(registry: &PackageRegistry) -> Self {
        Self::from_shared(registry.as_map().values().cloned())
    }

    /// Builds a graph from packages that are already shared.
    pub fn from_shared(packages: impl IntoIterator<Item = Arc<Package>>) -> Self {
        let packages: IndexMap<String, Arc<Package>> = packages
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();

        let lookup: HashMap<String, String> = packages
            .keys()
            .map(|name| (normalize_name(name), name.clone()))
            .collect();

        let mut edges: IndexMap<String, IndexSet<String>> = packages
            .keys()
            .map(|name| (name.clone(), IndexSet::new()))
            .collect();
        let mut reverse_edges = edges.clone();

        for (name, package) in &packages {
            for dep in &package.workspace_dependencies {
                let Some(target) = lookup.get(&normalize_name(dep)) else {
                    continue;
                };
                if let Some(deps) = edges.get_mut(name) {
                    deps.insert(target.clone());
                }
                if let Some(dependents) = reverse_edges.get_mut(target) {
                    dependents.insert(name.clone());
                }
            }
        }

        Self {
            packages,
            lookup,
            edges,
            reverse_edges,
        }
    }

    fn resolve(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.packages.get_key_value(name) {
            return Some(key.as_str());
        }
        self.lookup.get(&normalize_name(name)).map(String::as_str)
    }

    fn index_of(&self, name: &str) -> usize {
        self.packages.get_index_of(name).unwrap_or(usize::MAX)
    }

    fn collect(&self, names: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<Arc<Package>> {
        let mut found: Vec<(usize, Arc<Package>)> = names
            .into_iter()
            .filter_map(|n| self.packages.get_full(n.as_ref()))
            .map(|(idx, _, pkg)| (idx, Arc::clone(pkg)))
            .collect();
        found.sort_by_key(|(idx, _)| *idx);
        found.into_iter().map(|(_, pkg)| pkg).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Retrieves a package by exact or normalized name.
    pub fn package(&self, name: &str) -> Option<&Arc<Package>> {
        self.resolve(name).and_then(|n| self.packages.get(n))
    }

    /// All packages in insertion order.
    pub fn packages(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.packages.values()
    }

    /// Direct dependencies of a package. Unknown names have none.
    pub fn dependencies(&self, name: &str) -> Vec<Arc<Package>> {
        self.neighbors(&self.edges, name)
    }

    /// Direct dependents of a package. Unknown names have none.
    pub fn dependents(&self, name: &str) -> Vec<Arc<Package>> {
        self.neighbors(&self.reverse_edges, name)
    }

    fn neighbors(&self, map: &IndexMap<String, IndexSet<String>>, name: &str) -> Vec<Arc<Package>> {
        self.resolve(name)
            .and_then(|n| map.get(n))
            .map(|set| self.collect(set.iter()))
            .unwrap_or_default()
    }

    /// Every package `name` depends on, directly or indirectly.
    pub fn transitive_dependencies(&self, name: &str) -> Vec<Arc<Package>> {
        self.closure(&self.edges, name)
    }

    /// Every package that depends on `name`, directly or indirectly.
    ///
    /// This includes packages that depend on packages that depend on this
    /// package, and so on.
    pub fn transitive_dependents(&self, name: &str) -> Vec<Arc<Package>> {
        self.closure(&self.reverse_edges, name)
    }

    fn closure_names<'a>(
        &'a self,
        map: &'a IndexMap<String, IndexSet<String>>,
        start: &str,
    ) -> HashSet<&'a str> {
        let mut result = HashSet::new();
        let Some(start) = self.resolve(start) else {
            return result;
        };
        let mut stack: Vec<&str> = map
            .get(start)
            .map(|s| s.iter().map(String::as_str).collect())
            .unwrap_or_default();

        while let Some(current) = stack.pop() {
            if !result.insert(current) {
                continue;
            }
            if let Some(next) = map.get(current) {
                stack.extend(next.iter().map(String::as_str).filter(|n| !result.contains(n)));
            }
        }

        result.remove(start);
        result
    }

    fn closure(&self, map: &IndexMap<String, IndexSet<String>>, name: &str) -> Vec<Arc<Package>> {
        self.collect(self.closure_names(map, name))
    }

    /// Returns the changed packages plus all of their transitive dependents.
    ///
    /// Names that are not in the graph contribute nothing.
    pub fn affected_packages<I, S>(&self, changed: I) -> Vec<Arc<Package>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut affected: HashSet<&str> = HashSet::new();
        for name in changed {
            let Some(resolved) = self.resolve(name.as_ref()) else {
                continue;
            };
            affected.insert(resolved);
            affected.extend(self.closure_names(&self.reverse_edges, resolved));
        }
        self.collect(affected)
    }

    /// Packages with no dependencies inside the workspace.
    pub fn roots(&self) -> Vec<Arc<Package>> {
        self.collect(
            self.edges
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(name, _)| name),
        )
    }

    /// Packages nothing else in the workspace depends on.
    pub fn leaves(&self) -> Vec<Arc<Package>> {
        self.collect(
            self.reverse_edges
                .iter()
                .filter(|(_, dependents)| dependents.is_empty())
                .map(|(name, _)| name),
        )
    }

    /// Returns groups of packages that can run concurrently.
    ///
    /// Group `k` holds exactly the packages whose dependencies all appear in
    /// groups `0..k`. Within a group, packages keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CyclicDependency`] carrying the loop if the graph is
    /// not acyclic. Nothing is returned in that case.
    pub fn parallel_batches(&self) -> Result<Vec<Vec<Arc<Package>>>> {
        let batches = self.kahn_batches()?;
        Ok(batches
            .into_iter()
            .map(|batch| batch.into_iter().map(|n| Arc::clone(&self.packages[n])).collect())
            .collect())
    }

    /// Returns packages so that each comes after everything it depends on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CyclicDependency`] if the graph contains a cycle.
    pub fn topological_order(&self) -> Result<Vec<Arc<Package>>> {
        Ok(self.parallel_batches()?.into_iter().flatten().collect())
    }

    /// Returns packages so that dependents come before their dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CyclicDependency`] if the graph contains a cycle.
    pub fn reverse_topological_order(&self) -> Result<Vec<Arc<Package>>> {
        let mut order = self.topological_order()?;
        order.reverse();
        Ok(order)
    }

    fn kahn_batches(&self) -> Result<Vec<Vec<&str>>> {
        let mut remaining: IndexMap<&str, usize> = self
            .edges
            .iter()
            .map(|(name, deps)| (name.as_str(), deps.len()))
            .collect();

        let mut ready: Vec<&str> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut batches = Vec::new();
        let mut emitted = 0;

        while !ready.is_empty() {
            let mut next = Vec::new();
            for name in &ready {
                let Some(dependents) = self.reverse_edges.get(*name) else {
                    continue;
                };
                for dependent in dependents {
                    if let Some(count) = remaining.get_mut(dependent.as_str()) {
                        *count -= 1;
                        if *count == 0 {
                            next.push(dependent.as_str());
                        }
                    }
                }
            }
            next.sort_by_key(|n| self.index_of(n));
            emitted += ready.len();
            batches.push(std::mem::replace(&mut ready, next));
        }

        if emitted < self.packages.len() {
            let stuck: HashSet<&str> = remaining
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(name, _)| *name)
                .collect();
            return Err(Error::CyclicDependency {
                cycle: self.find_cycle(&stuck),
            });
        }

        Ok(batches)
    }

    /// Walks dependency edges through the packages Kahn could not emit until
    /// a name repeats. Every stuck package has at least one stuck
    /// dependency, so the walk always closes a loop.
    fn find_cycle(&self, stuck: &HashSet<&str>) -> Vec<String> {
        let Some(start) = self.packages.keys().map(String::as_str).find(|n| stuck.contains(n))
        else {
            return Vec::new();
        };

        let mut path: Vec<&str> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();
        let mut current = start;

        loop {
            if let Some(&idx) = position.get(current) {
                return path[idx..].iter().map(|s| s.to_string()).collect();
            }
            position.insert(current, path.len());
            path.push(current);

            let next = self.edges.get(current).and_then(|deps| {
                deps.iter()
                    .map(String::as_str)
                    .filter(|d| stuck.contains(d))
                    .min_by_key(|d| self.index_of(d))
            });
            match next {
                Some(n) => current = n,
                None => return path.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    /// Returns a new graph containing only the named packages.
    ///
    /// Edges to packages outside `names` are removed, not hidden.
    pub fn subgraph<I, S>(&self, names: I) -> DependencyGraph
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keep: HashSet<String> = names.into_iter().map(|n| normalize_name(n.as_ref())).collect();
        Self::from_shared(
            self.packages
                .iter()
                .filter(|(name, _)| keep.contains(&normalize_name(name)))
                .map(|(_, pkg)| Arc::clone(pkg)),
        )
    }

    /// Adjacency list: package name to its sorted dependency names.
    pub fn to_adjacency(&self) -> IndexMap<String, Vec<String>> {
        self.edges
            .iter()
            .map(|(name, deps)| {
                let mut deps: Vec<String> = deps.iter().cloned().collect();
                deps.sort();
                (name.clone(), deps)
            })
            .collect()
    }

    fn to_petgraph(&self) -> DiGraph<String, &'static str> {
        let mut graph = DiGraph::new();
        let nodes: HashMap<&str, NodeIndex> = self
            .packages
            .keys()
            .map(|name| (name.as_str(), graph.add_node(name.clone())))
            .collect();
        for (name, deps) in &self.edges {
            for dep in deps {
                graph.add_edge(nodes[name.as_str()], nodes[dep.as_str()], "");
            }
        }
        graph
    }

    /// Lists every dependency cycle in the graph.
    ///
    /// Each entry is one strongly connected component with more than one
    /// package, or a single package that depends on itself.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let graph = self.to_petgraph();
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut names: Vec<String> = scc.into_iter().map(|idx| graph[idx].clone()).collect();
                names.sort_by_key(|n| self.index_of(n));
                names
            })
            .collect();
        cycles.sort_by_key(|c| c.first().map(|n| self.index_of(n)).unwrap_or(usize::MAX));
        cycles
    }

    /// Renders the graph in Graphviz DOT format.
    pub fn to_dot(&self) -> String {
        let graph = self.to_petgraph();
        format!("{}", Dot::with_config(&graph, &[DotConfig::EdgeNoLabel]))
    }
}
