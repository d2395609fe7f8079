//! Dependency closure over vendor pages and components.
//!
//! Every manifest is a node; every `usingComponents` entry is an edge. The
//! walk is a depth-first search with an explicit visited set, so cycles
//! between components terminate and each manifest is read once.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, NodeIndex};

use super::manifest::{normalize_reference, segment, ComponentManifest, MANIFEST_FILE};

/// Name of the shared component tree inside a vendor copy.
pub const COMPONENTS_DIR: &str = "components";

/// A manifest in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    /// `<vendor>/<tag>/<name>/index.json`
    Page(String),
    /// `<vendor>/components/<name>/index.json`
    Component(String),
    /// A component nested inside a page or component directory, by manifest path.
    Local(PathBuf),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Page(name) => write!(f, "page `{}`", name),
            NodeId::Component(name) => write!(f, "component `{}`", name),
            NodeId::Local(path) => write!(f, "local component {}", path.display()),
        }
    }
}

/// Why one manifest depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// A `usingComponents` entry.
    Uses,
    /// A page referencing another vendor page.
    CommonPage,
    /// A component directory nested in a page directory.
    Contains,
}

/// The directories of one vendor copy.
#[derive(Debug, Clone)]
pub struct VendorLayout {
    pub pages_dir: PathBuf,
    pub components_dir: Option<PathBuf>,
}

impl VendorLayout {
    fn manifest_path(&self, node: &NodeId) -> Option<PathBuf> {
        match node {
            NodeId::Page(name) => Some(self.pages_dir.join(name).join(MANIFEST_FILE)),
            NodeId::Component(name) => self
                .components_dir
                .as_ref()
                .map(|dir| dir.join(name).join(MANIFEST_FILE)),
            NodeId::Local(path) => Some(path.clone()),
        }
    }
}

/// Knobs for the walk.
#[derive(Debug, Clone)]
pub struct ClosureOptions {
    /// References starting with this name resolve through vendor already.
    pub vendor_dir_name: String,
    /// Walk vendor pages reached through other pages, not just record them.
    pub deep_page_closure: bool,
}

/// Result of the walk for one subpackage.
#[derive(Debug)]
pub struct DependencyClosure {
    graph: DiGraph<NodeId, EdgeKind>,
    seeds: BTreeSet<String>,
    /// Manifests that could not be read; they contribute no edges.
    pub unreadable: Vec<(PathBuf, anyhow::Error)>,
}

impl DependencyClosure {
    /// Vendor page names to keep: the seeds plus every page reached.
    pub fn needed_pages(&self) -> BTreeSet<String> {
        let mut pages = self.seeds.clone();
        pages.extend(self.graph.node_weights().filter_map(|n| match n {
            NodeId::Page(name) => Some(name.clone()),
            _ => None,
        }));
        pages
    }

    /// Vendor component names to keep.
    pub fn needed_components(&self) -> BTreeSet<String> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                NodeId::Component(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Direct dependencies of `node`, if it was reached.
    pub fn dependencies(&self, node: &NodeId) -> Vec<&NodeId> {
        self.graph
            .node_indices()
            .find(|&i| &self.graph[i] == node)
            .map(|i| self.graph.neighbors(i).map(|n| &self.graph[n]).collect())
            .unwrap_or_default()
    }
}

struct Walker<'a> {
    layout: &'a VendorLayout,
    opts: &'a ClosureOptions,
    graph: DiGraph<NodeId, EdgeKind>,
    index: HashMap<NodeId, NodeIndex>,
    unreadable: Vec<(PathBuf, anyhow::Error)>,
}

impl<'a> Walker<'a> {
    /// Add `node` if new. Returns its index and whether it was new.
    fn visit(&mut self, node: NodeId) -> (NodeIndex, bool) {
        if let Some(&idx) = self.index.get(&node) {
            return (idx, false);
        }
        let idx = self.graph.add_node(node.clone());
        self.index.insert(node, idx);
        (idx, true)
    }

    fn walk(&mut self, roots: Vec<NodeId>) {
        let mut stack: Vec<NodeIndex> = Vec::new();
        for root in roots {
            let (idx, is_new) = self.visit(root);
            if is_new {
                stack.push(idx);
            }
        }

        while let Some(idx) = stack.pop() {
            let node = self.graph[idx].clone();
            for (target, kind) in self.edges_of(&node) {
                let (target_idx, is_new) = self.visit(target);
                if !self.graph.contains_edge(idx, target_idx) {
                    self.graph.add_edge(idx, target_idx, kind);
                }
                let expand = kind != EdgeKind::CommonPage || self.opts.deep_page_closure;
                if is_new && expand {
                    stack.push(target_idx);
                }
            }
        }
    }

    fn edges_of(&mut self, node: &NodeId) -> Vec<(NodeId, EdgeKind)> {
        let Some(path) = self.layout.manifest_path(node) else {
            tracing::debug!("no components directory for {}", node);
            return Vec::new();
        };

        let mut edges = Vec::new();
        match ComponentManifest::load(&path) {
            Ok(manifest) => {
                let base = path.parent().unwrap_or(Path::new("."));
                for raw in manifest.references() {
                    if let Some(edge) = self.classify(node, base, raw) {
                        edges.push(edge);
                    }
                }
            }
            Err(e) => {
                tracing::warn!("{:#}", e);
                self.unreadable.push((path.clone(), e));
            }
        }

        if let NodeId::Page(name) = node {
            edges.extend(self.page_local_components(name));
        }

        edges
    }

    /// Decide what a single `usingComponents` entry points at.
    fn classify(&self, from: &NodeId, base: &Path, raw: &str) -> Option<(NodeId, EdgeKind)> {
        let path = normalize_reference(raw);
        if path.starts_with(self.opts.vendor_dir_name.as_str()) {
            return None;
        }

        let under_components = path.starts_with(COMPONENTS_DIR);
        match from {
            NodeId::Page(_) => {
                if under_components {
                    // `./components/..` is page-local and reached via `Contains`
                    if raw.starts_with("../") {
                        let name = segment(path, 1)?;
                        return Some((NodeId::Component(name.to_string()), EdgeKind::Uses));
                    }
                    return None;
                }
                let name = segment(path, 0)?;
                Some((NodeId::Page(name.to_string()), EdgeKind::CommonPage))
            }
            NodeId::Local(manifest)
                if !under_components && manifest.starts_with(&self.layout.pages_dir) =>
            {
                // Siblings of a page-local component are page-local too
                tracing::trace!("skipping {} from {}", raw, manifest.display());
                None
            }
            NodeId::Component(_) | NodeId::Local(_) => {
                if under_components {
                    if raw.starts_with("./") {
                        let manifest = base.join(format!("{}.json", path));
                        return Some((NodeId::Local(manifest), EdgeKind::Uses));
                    }
                    let name = segment(path, 1)?;
                    return Some((NodeId::Component(name.to_string()), EdgeKind::Uses));
                }
                let name = segment(path, 0)?;
                Some((NodeId::Component(name.to_string()), EdgeKind::Uses))
            }
        }
    }

    /// `<page>/components/<name>/index.json` manifests owned by a vendor page.
    fn page_local_components(&self, page: &str) -> Vec<(NodeId, EdgeKind)> {
        let dir = self.layout.pages_dir.join(page).join(COMPONENTS_DIR);
        if !dir.is_dir() {
            return Vec::new();
        }

        match crate::util::fs::child_dir_names(&dir) {
            Ok(names) => names
                .into_iter()
                .map(|name| dir.join(name).join(MANIFEST_FILE))
                .filter(|manifest| manifest.is_file())
                .map(|manifest| (NodeId::Local(manifest), EdgeKind::Contains))
                .collect(),
            Err(e) => {
                tracing::warn!("{:#}", e);
                Vec::new()
            }
        }
    }
}

/// Walk from the vendor pages named in `seeds` and collect every page and
/// component they reach.
///
/// Seeds that have no directory in the vendor pages tree are kept as needed
/// names but not walked. Vendor pages reached from another page are walked
/// only with `deep_page_closure`; otherwise they are merged one level deep.
pub fn resolve_closure(
    layout: &VendorLayout,
    seeds: &[String],
    opts: &ClosureOptions,
) -> DependencyClosure {
    let mut walker = Walker {
        layout,
        opts,
        graph: DiGraph::new(),
        index: HashMap::new(),
        unreadable: Vec::new(),
    };

    let roots = seeds
        .iter()
        .filter(|name| layout.pages_dir.join(name.as_str()).is_dir())
        .map(|name| NodeId::Page(name.clone()))
        .collect();
    walker.walk(roots);

    tracing::debug!(
        "closure for {}: {} nodes, {} edges",
        layout.pages_dir.display(),
        walker.graph.node_count(),
        walker.graph.edge_count()
    );

    DependencyClosure {
        graph: walker.graph,
        seeds: seeds.iter().cloned().collect(),
        unreadable: walker.unreadable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::VendorFixture;

    fn opts(deep: bool) -> ClosureOptions {
        ClosureOptions {
            vendor_dir_name: "node-modules".to_string(),
            deep_page_closure: deep,
        }
    }

    fn seeds(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_transitive_components() {
        let fx = VendorFixture::new()
            .page("p1", &[("a", "../../components/a/index")])
            .component("a", &[("b", "../b/index")])
            .component("b", &[])
            .component("c", &[]);

        let closure = resolve_closure(&fx.layout(), &seeds(&["p1"]), &opts(false));
        let components: Vec<_> = closure.needed_components().into_iter().collect();
        assert_eq!(components, vec!["a", "b"]);
        assert!(closure.unreadable.is_empty());
    }

    #[test]
    fn test_component_cycle_terminates() {
        let fx = VendorFixture::new()
            .page("p1", &[("a", "../../components/a/index")])
            .component("a", &[("b", "../b/index")])
            .component("b", &[("a", "../a/index")]);

        let closure = resolve_closure(&fx.layout(), &seeds(&["p1"]), &opts(false));
        assert_eq!(closure.needed_components().len(), 2);
        assert_eq!(closure.node_count(), 3);
    }

    #[test]
    fn test_vendor_rooted_references_are_skipped() {
        let fx = VendorFixture::new()
            .page("p1", &[("x", "../../../node-modules/components/x/index")])
            .component("x", &[]);

        let closure = resolve_closure(&fx.layout(), &seeds(&["p1"]), &opts(false));
        assert!(closure.needed_components().is_empty());
    }

    #[test]
    fn test_common_page_is_merged_one_level() {
        let fx = VendorFixture::new()
            .page("p1", &[("shared", "../p2/index")])
            .page("p2", &[("deeper", "../p3/index"), ("c", "../../components/c/index")])
            .page("p3", &[])
            .component("c", &[]);

        let closure = resolve_closure(&fx.layout(), &seeds(&["p1"]), &opts(false));
        let pages: Vec<_> = closure.needed_pages().into_iter().collect();
        assert_eq!(pages, vec!["p1", "p2"]);
        assert!(closure.needed_components().is_empty());
    }

    #[test]
    fn test_deep_page_closure_walks_common_pages() {
        let fx = VendorFixture::new()
            .page("p1", &[("shared", "../p2/index")])
            .page("p2", &[("deeper", "../p3/index"), ("c", "../../components/c/index")])
            .page("p3", &[])
            .component("c", &[]);

        let closure = resolve_closure(&fx.layout(), &seeds(&["p1"]), &opts(true));
        let pages: Vec<_> = closure.needed_pages().into_iter().collect();
        assert_eq!(pages, vec!["p1", "p2", "p3"]);
        assert!(closure.needed_components().contains("c"));
    }

    #[test]
    fn test_page_local_components() {
        let fx = VendorFixture::new()
            .page("p1", &[("card", "./components/card/index")])
            .page_component("p1", "card", &[
                ("inner", "./components/inner/index"),
                ("btn", "../../../../components/btn/index"),
            ])
            .file(
                "pages/p1/components/card/components/inner/index.json",
                r#"{"usingComponents":{"icon":"../../../../../../components/icon/index"}}"#,
            )
            .component("btn", &[])
            .component("icon", &[])
            .component("unused", &[]);

        let closure = resolve_closure(&fx.layout(), &seeds(&["p1"]), &opts(false));
        let components: Vec<_> = closure.needed_components().into_iter().collect();
        assert_eq!(components, vec!["btn", "icon"]);
        assert!(closure.unreadable.is_empty());
    }

    #[test]
    fn test_page_local_sibling_is_not_vendor() {
        let fx = VendorFixture::new()
            .page("p1", &[("card", "./components/card/index")])
            .page_component("p1", "card", &[("other", "../other/index")])
            .page_component("p1", "other", &[])
            .component("other", &[]);

        let closure = resolve_closure(&fx.layout(), &seeds(&["p1"]), &opts(false));
        assert!(closure.needed_components().is_empty());
        assert!(closure.unreadable.is_empty());
    }

    #[test]
    fn test_component_local_subcomponent() {
        let fx = VendorFixture::new()
            .page("p1", &[("a", "../../components/a/index")])
            .component("a", &[("part", "./components/part/index")])
            .file(
                "components/a/components/part/index.json",
                r#"{"usingComponents":{"b":"../../../b/index"}}"#,
            )
            .component("b", &[]);

        let closure = resolve_closure(&fx.layout(), &seeds(&["p1"]), &opts(false));
        let components: Vec<_> = closure.needed_components().into_iter().collect();
        assert_eq!(components, vec!["a", "b"]);
    }

    #[test]
    fn test_malformed_manifest_contributes_nothing() {
        let fx = VendorFixture::new()
            .file("pages/p1/index.json", "{ broken")
            .component("a", &[]);

        let closure = resolve_closure(&fx.layout(), &seeds(&["p1"]), &opts(false));
        assert_eq!(closure.unreadable.len(), 1);
        assert!(closure.needed_components().is_empty());
        assert!(closure.needed_pages().contains("p1"));
    }

    #[test]
    fn test_dependencies_of_node() {
        let fx = VendorFixture::new()
            .page("p1", &[("a", "../../components/a/index")])
            .component("a", &[]);

        let closure = resolve_closure(&fx.layout(), &seeds(&["p1"]), &opts(false));
        let deps = closure.dependencies(&NodeId::Page("p1".to_string()));
        assert_eq!(deps, vec![&NodeId::Component("a".to_string())]);
    }
}
