use std::collections::HashSet;
use std::sync::Arc;

use weft_core::error::Error;
use weft_core::graph::DependencyGraph;
use weft_core::package::Package;

fn pkg(name: &str, deps: &[&str]) -> Package {
    Package::new(name, format!("/ws/{}", name), "1.0.0").with_workspace_dependencies(deps.iter().copied())
}

fn names(packages: &[Arc<Package>]) -> Vec<&str> {
    packages.iter().map(|p| p.name.as_str()).collect()
}

fn chain() -> DependencyGraph {
    DependencyGraph::new(vec![
        pkg("app", &["utils"]),
        pkg("utils", &["core"]),
        pkg("core", &[]),
    ])
}

#[test]
fn test_chain_batches() {
    let graph = chain();
    let batches = graph.parallel_batches().unwrap();
    let batches: Vec<Vec<&str>> = batches.iter().map(|b| names(b)).collect();
    assert_eq!(batches, vec![vec!["core"], vec!["utils"], vec!["app"]]);
}

#[test]
fn test_independent_packages_share_one_batch() {
    let graph = DependencyGraph::new(vec![pkg("a", &[]), pkg("b", &[]), pkg("c", &[])]);
    let batches = graph.parallel_batches().unwrap();
    assert_eq!(batches.len(), 1);
    let set: HashSet<&str> = names(&batches[0]).into_iter().collect();
    assert_eq!(set, HashSet::from(["a", "b", "c"]));
}

#[test]
fn test_topological_and_reverse_order() {
    let graph = chain();
    assert_eq!(names(&graph.topological_order().unwrap()), vec!["core", "utils", "app"]);
    assert_eq!(
        names(&graph.reverse_topological_order().unwrap()),
        vec!["app", "utils", "core"]
    );
}

#[test]
fn test_direct_queries() {
    let graph = chain();
    assert_eq!(names(&graph.dependencies("utils")), vec!["core"]);
    assert_eq!(names(&graph.dependents("utils")), vec!["app"]);
    assert!(graph.dependencies("core").is_empty());
    assert!(graph.dependents("unknown").is_empty());
    assert!(graph.dependencies("unknown").is_empty());
}

#[test]
fn test_transitive_queries() {
    let graph = chain();
    let deps = graph.transitive_dependencies("app");
    let mut deps = names(&deps);
    deps.sort_unstable();
    assert_eq!(deps, vec!["core", "utils"]);

    let dependents = graph.transitive_dependents("core");
    let mut dependents = names(&dependents);
    dependents.sort_unstable();
    assert_eq!(dependents, vec!["app", "utils"]);

    assert!(graph.transitive_dependents("app").is_empty());
    assert!(graph.transitive_dependents("nope").is_empty());
}

#[test]
fn test_transitive_dependents_excludes_start_in_cycle() {
    let graph = DependencyGraph::new(vec![pkg("a", &["b"]), pkg("b", &["a"])]);
    assert_eq!(names(&graph.transitive_dependents("a")), vec!["b"]);
}

#[test]
fn test_affected_packages() {
    let graph = DependencyGraph::new(vec![
        pkg("core", &[]),
        pkg("utils", &["core"]),
        pkg("app", &["utils"]),
        pkg("docs", &[]),
    ]);
    let affected: HashSet<String> = graph
        .affected_packages(["utils"])
        .iter()
        .map(|p| p.name.clone())
        .collect();
    assert_eq!(affected, HashSet::from(["utils".to_string(), "app".to_string()]));

    assert!(graph.affected_packages(["missing"]).is_empty());
}

#[test]
fn test_roots_and_leaves() {
    let graph = DependencyGraph::new(vec![
        pkg("core", &[]),
        pkg("utils", &["core"]),
        pkg("app", &["utils"]),
        pkg("lone", &[]),
    ]);
    assert_eq!(names(&graph.roots()), vec!["core", "lone"]);
    assert_eq!(names(&graph.leaves()), vec!["app", "lone"]);
}

#[test]
fn test_two_node_cycle_fails_both_orderings() {
    let graph = DependencyGraph::new(vec![pkg("a", &["b"]), pkg("b", &["a"])]);

    let err = graph.topological_order().unwrap_err();
    let cycle: HashSet<&str> = err.cycle().unwrap().iter().map(String::as_str).collect();
    assert_eq!(cycle, HashSet::from(["a", "b"]));

    match graph.parallel_batches() {
        Err(Error::CyclicDependency { cycle }) => assert_eq!(cycle.len(), 2),
        other => panic!("expected cycle error, got {:?}", other.map(|b| b.len())),
    }
}

#[test]
fn test_cycle_error_message_names_the_loop() {
    let graph = DependencyGraph::new(vec![pkg("a", &["b"]), pkg("b", &["a"])]);
    let message = graph.topological_order().unwrap_err().to_string();
    assert!(message.contains("a -> b -> a"), "{}", message);
}

#[test]
fn test_cycles_lists_every_loop() {
    let graph = DependencyGraph::new(vec![
        pkg("a", &["b"]),
        pkg("b", &["a"]),
        pkg("c", &[]),
        pkg("d", &["e"]),
        pkg("e", &["d"]),
    ]);
    let cycles = graph.cycles();
    assert_eq!(cycles.len(), 2);
    assert!(chain().cycles().is_empty());
}

#[test]
fn test_subgraph_drops_excluded_edges() {
    let graph = chain();
    let sub = graph.subgraph(["app", "utils"]);
    assert_eq!(sub.len(), 2);
    assert!(!sub.contains("core"));

    let adjacency = sub.to_adjacency();
    assert_eq!(adjacency["utils"], Vec::<String>::new());
    assert_eq!(adjacency["app"], vec!["utils".to_string()]);
    assert_eq!(names(&sub.topological_order().unwrap()), vec!["utils", "app"]);
}

#[test]
fn test_subgraph_ignores_unknown_names() {
    let sub = chain().subgraph(["core", "ghost"]);
    assert_eq!(sub.len(), 1);
    assert!(sub.to_adjacency()["core"].is_empty());
}

#[test]
fn test_package_lookup() {
    let graph = DependencyGraph::new(vec![pkg("My-Lib", &[])]);
    assert!(graph.contains("my_lib"));
    assert_eq!(graph.package("MY-LIB").unwrap().name, "My-Lib");
    assert!(graph.package("other").is_none());
    assert!(!graph.is_empty());
}
