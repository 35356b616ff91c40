//! Module instantiation graph built on petgraph::StableDiGraph
//!
//! Nodes are module definitions keyed by name; an edge `parent -> child` exists
//! once per distinct child type the parent instantiates. Reverse edges are the
//! incoming edges of the same graph, so forward and reverse views are always
//! symmetric. The graph is rebuilt wholesale; there is no incremental patching.

use crate::model::*;
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// Sources, sinks and touched modules for one signal name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalImpact {
    pub signal: String,
    pub sources: Vec<SignalEndpoint>,
    pub sinks: Vec<SignalEndpoint>,
    pub affected_modules: Vec<String>,
}

/// Size and depth figures for one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleComplexity {
    pub module: String,
    pub instance_count: usize,
    pub port_count: usize,
    /// Connections driving a child input (inout counts on both sides).
    pub inbound_connections: usize,
    /// Connections driven by a child output (inout counts on both sides).
    pub outbound_connections: usize,
    /// Every connection across the module's instances.
    pub connection_count: usize,
    /// Longest forward-edge chain below this module; 0 for a leaf.
    pub hierarchy_depth: usize,
}

/// One instance in the elaborated-by-name instance tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub module: String,
    /// `None` for a top-level module.
    pub instance: Option<String>,
    pub children: Vec<HierarchyNode>,
}

/// The module graph: nodes, instantiation edges and derived signal flows.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ModuleGraph {
    inner: StableDiGraph<ModuleNode, Instantiation>,
    by_name: HashMap<String, NodeIndex>,
    /// Parent -> instantiated types with no module node.
    external: BTreeMap<String, BTreeSet<String>>,
    signal_flows: Vec<SignalFlowEdge>,
    diagnostics: Vec<GraphDiagnostic>,
}

impl std::fmt::Debug for ModuleGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .field("signal_flows", &self.signal_flows.len())
            .finish()
    }
}

impl ModuleGraph {
    pub fn new() -> Self {
        ModuleGraph::default()
    }

    /// Build a fresh graph from module definitions and instance records.
    pub fn build(modules: &[ModuleDefinition], instances: &[Instance]) -> Self {
        let mut graph = ModuleGraph::new();
        graph.rebuild(modules, instances);
        graph
    }

    /// Reset all state and rebuild from scratch.
    pub fn rebuild(&mut self, modules: &[ModuleDefinition], instances: &[Instance]) {
        *self = ModuleGraph::default();

        for def in modules {
            if let Some(&existing) = self.by_name.get(&def.name) {
                self.diagnostics.push(GraphDiagnostic::DuplicateModule {
                    name: def.name.clone(),
                    kept: self.inner[existing].file_path.clone(),
                    ignored: def.file_path.clone(),
                });
                continue;
            }
            let idx = self.inner.add_node(ModuleNode::from_definition(def));
            self.by_name.insert(def.name.clone(), idx);
        }

        let mut defs_by_file: HashMap<&Path, Vec<&ModuleDefinition>> = HashMap::new();
        for def in modules {
            defs_by_file.entry(def.file_path.as_path()).or_default().push(def);
        }

        for record in instances {
            let Some(def) = defs_by_file
                .get(record.file_path.as_path())
                .and_then(|defs| enclosing_module(defs, record.line))
            else {
                self.diagnostics.push(GraphDiagnostic::OrphanInstance {
                    instance: record.name.clone(),
                    file_path: record.file_path.clone(),
                    line: record.line,
                });
                continue;
            };

            // The enclosing definition may be a duplicate that lost to another file.
            let parent = self.by_name.get(&def.name).copied().filter(|&idx| {
                let node = &self.inner[idx];
                node.file_path == def.file_path && node.line_start == def.line_start
            });
            let Some(parent_idx) = parent else {
                self.diagnostics.push(GraphDiagnostic::ShadowedInstance {
                    instance: record.name.clone(),
                    module: def.name.clone(),
                    file_path: record.file_path.clone(),
                    line: record.line,
                });
                continue;
            };

            let mut instance = record.clone();
            let parent_name = self.inner[parent_idx].name.clone();

            match self.by_name.get(&instance.module_type).copied() {
                Some(child_idx) => {
                    resolve_connections(
                        &mut instance,
                        &self.inner[child_idx],
                        &parent_name,
                        &mut self.diagnostics,
                    );
                    resolve_overrides(
                        &mut instance,
                        &self.inner[child_idx],
                        &parent_name,
                        &mut self.diagnostics,
                    );

                    let child = &mut self.inner[child_idx];
                    for (name, value) in &instance.parameter_overrides {
                        child.parameter_overrides.insert(name.clone(), value.clone());
                    }

                    match self.inner.find_edge(parent_idx, child_idx) {
                        Some(edge) => {
                            let weight = &mut self.inner[edge];
                            weight.instance_count += 1;
                            weight.instance_names.push(instance.name.clone());
                        }
                        None => {
                            self.inner.add_edge(
                                parent_idx,
                                child_idx,
                                Instantiation {
                                    instance_count: 1,
                                    instance_names: vec![instance.name.clone()],
                                },
                            );
                        }
                    }
                }
                None => {
                    debug!(
                        "{}.{} instantiates unresolved module {}",
                        parent_name, instance.name, instance.module_type
                    );
                    self.diagnostics.push(GraphDiagnostic::UnresolvedModule {
                        parent: parent_name.clone(),
                        instance: instance.name.clone(),
                        module_type: instance.module_type.clone(),
                    });
                    self.external
                        .entry(parent_name)
                        .or_default()
                        .insert(instance.module_type.clone());
                }
            }

            self.inner[parent_idx].instances.push(instance);
        }

        self.compute_signal_flows();

        info!(
            "Built module graph: {} modules, {} edges, {} signal flows, {} diagnostics",
            self.inner.node_count(),
            self.inner.edge_count(),
            self.signal_flows.len(),
            self.diagnostics.len()
        );
    }

    /// Derive direction-aware flows for every connection into a known child.
    fn compute_signal_flows(&mut self) {
        let mut flows = Vec::new();

        for parent_idx in self.inner.node_indices() {
            let parent = &self.inner[parent_idx];
            for instance in &parent.instances {
                if !self.by_name.contains_key(&instance.module_type) {
                    continue;
                }
                for conn in &instance.connections {
                    if conn.port_name.is_empty() || conn.signal_name.is_empty() {
                        continue;
                    }
                    let outer = SignalEndpoint {
                        module: parent.name.clone(),
                        instance: None,
                        port: conn.signal_name.clone(),
                    };
                    let inner = SignalEndpoint {
                        module: instance.module_type.clone(),
                        instance: Some(instance.name.clone()),
                        port: conn.port_name.clone(),
                    };
                    let path = vec![parent.name.clone(), instance.module_type.clone()];
                    let flow = |from: &SignalEndpoint, to: &SignalEndpoint| SignalFlowEdge {
                        from: from.clone(),
                        to: to.clone(),
                        signal: conn.signal_name.clone(),
                        path: path.clone(),
                    };

                    match conn.direction {
                        Some(PortDirection::Input) => flows.push(flow(&outer, &inner)),
                        Some(PortDirection::Output) => flows.push(flow(&inner, &outer)),
                        Some(PortDirection::Inout) => {
                            flows.push(flow(&outer, &inner));
                            flows.push(flow(&inner, &outer));
                        }
                        None => {}
                    }
                }
            }
        }

        self.signal_flows = flows;
    }

    // ── Node access ─────────────────────────────────────────

    /// Total number of module nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of distinct parent -> child edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn module(&self, name: &str) -> Option<&ModuleNode> {
        self.by_name.get(name).map(|&idx| &self.inner[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Module names in definition order.
    pub fn module_names(&self) -> Vec<String> {
        self.inner
            .node_indices()
            .map(|idx| self.inner[idx].name.clone())
            .collect()
    }

    /// Iterate over all module nodes.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleNode> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    pub fn signal_flows(&self) -> &[SignalFlowEdge] {
        &self.signal_flows
    }

    pub fn diagnostics(&self) -> &[GraphDiagnostic] {
        &self.diagnostics
    }

    /// Unresolved child types instantiated by `parent`.
    pub fn external_references(&self, parent: &str) -> Vec<String> {
        self.external
            .get(parent)
            .map(|types| types.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Outgoing edges in insertion order.
    fn child_indices(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .inner
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.id().index(), e.target()))
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, target)| target).collect()
    }

    /// Incoming edges in insertion order.
    fn parent_indices(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .inner
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.id().index(), e.source()))
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, source)| source).collect()
    }

    fn names(&self, indices: &[NodeIndex]) -> Vec<String> {
        indices.iter().map(|&idx| self.inner[idx].name.clone()).collect()
    }

    /// Modules instantiated by `name` (forward edges).
    pub fn children(&self, name: &str) -> Vec<String> {
        self.by_name
            .get(name)
            .map(|&idx| self.names(&self.child_indices(idx)))
            .unwrap_or_default()
    }

    /// Modules that instantiate `name` (reverse edges).
    pub fn parents(&self, name: &str) -> Vec<String> {
        self.by_name
            .get(name)
            .map(|&idx| self.names(&self.parent_indices(idx)))
            .unwrap_or_default()
    }

    /// Forward adjacency for every node, keyed by module name.
    pub fn forward_edges(&self) -> BTreeMap<String, Vec<String>> {
        self.inner
            .node_indices()
            .map(|idx| (self.inner[idx].name.clone(), self.names(&self.child_indices(idx))))
            .collect()
    }

    /// Reverse adjacency for every node, keyed by module name.
    pub fn reverse_edges(&self) -> BTreeMap<String, Vec<String>> {
        self.inner
            .node_indices()
            .map(|idx| (self.inner[idx].name.clone(), self.names(&self.parent_indices(idx))))
            .collect()
    }

    // ── Derived queries ─────────────────────────────────────

    fn top_level_indices(&self) -> Vec<NodeIndex> {
        self.inner
            .node_indices()
            .filter(|&idx| {
                self.inner
                    .edges_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect()
    }

    /// Modules nothing instantiates.
    pub fn top_level_modules(&self) -> Vec<String> {
        self.names(&self.top_level_indices())
    }

    /// Modules that instantiate no known module.
    pub fn leaf_modules(&self) -> Vec<String> {
        self.inner
            .node_indices()
            .filter(|&idx| {
                self.inner
                    .edges_directed(idx, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .map(|idx| self.inner[idx].name.clone())
            .collect()
    }

    /// First path found from `from` to `to` by depth-first search over forward edges.
    pub fn find_module_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let start = *self.by_name.get(from)?;
        let goal = *self.by_name.get(to)?;

        let mut path = Vec::new();
        let mut visited = HashSet::new();
        if self.path_dfs(start, goal, &mut path, &mut visited) {
            Some(self.names(&path))
        } else {
            None
        }
    }

    fn path_dfs(
        &self,
        node: NodeIndex,
        goal: NodeIndex,
        path: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
    ) -> bool {
        visited.insert(node);
        path.push(node);
        if node == goal {
            return true;
        }
        for child in self.child_indices(node) {
            if visited.contains(&child) {
                continue;
            }
            if self.path_dfs(child, goal, path, visited) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// Every flow carrying `signal`, reduced to distinct endpoints and modules.
    pub fn signal_impact(&self, signal: &str) -> SignalImpact {
        let mut impact = SignalImpact {
            signal: signal.to_string(),
            ..Default::default()
        };

        for flow in self.signal_flows.iter().filter(|f| f.signal == signal) {
            if !impact.sources.contains(&flow.from) {
                impact.sources.push(flow.from.clone());
            }
            if !impact.sinks.contains(&flow.to) {
                impact.sinks.push(flow.to.clone());
            }
            for module in [&flow.from.module, &flow.to.module] {
                if !impact.affected_modules.contains(module) {
                    impact.affected_modules.push(module.clone());
                }
            }
        }

        impact
    }

    /// Longest instantiation chain from any top-level module. Ties keep the first found.
    pub fn critical_path(&self) -> Vec<String> {
        let mut best: Vec<NodeIndex> = Vec::new();
        let mut memo = HashMap::new();

        for root in self.top_level_indices() {
            let mut on_path = HashSet::new();
            let (path, _) = self.longest_from(root, &mut on_path, &mut memo);
            if path.len() > best.len() {
                best = path;
            }
        }

        self.names(&best)
    }

    /// Longest simple path starting at `node` that avoids `on_path`.
    ///
    /// The flag reports whether a child was skipped because it was already on
    /// the path; such results depend on the path and are not memoized.
    fn longest_from(
        &self,
        node: NodeIndex,
        on_path: &mut HashSet<NodeIndex>,
        memo: &mut HashMap<NodeIndex, Vec<NodeIndex>>,
    ) -> (Vec<NodeIndex>, bool) {
        if let Some(cached) = memo.get(&node) {
            return (cached.clone(), false);
        }

        on_path.insert(node);
        let mut best_tail = Vec::new();
        let mut cut = false;
        for child in self.child_indices(node) {
            if on_path.contains(&child) {
                cut = true;
                continue;
            }
            let (tail, child_cut) = self.longest_from(child, on_path, memo);
            cut |= child_cut;
            if tail.len() > best_tail.len() {
                best_tail = tail;
            }
        }
        on_path.remove(&node);

        let mut path = Vec::with_capacity(best_tail.len() + 1);
        path.push(node);
        path.extend(best_tail);
        if !cut {
            memo.insert(node, path.clone());
        }
        (path, cut)
    }

    /// Instance, port and connection counts plus hierarchy depth for `name`.
    pub fn module_complexity(&self, name: &str) -> Option<ModuleComplexity> {
        let &idx = self.by_name.get(name)?;
        let node = &self.inner[idx];

        let mut inbound = 0;
        let mut outbound = 0;
        let mut total = 0;
        for conn in node.instances.iter().flat_map(|i| i.connections.iter()) {
            total += 1;
            match conn.direction {
                Some(PortDirection::Input) => inbound += 1,
                Some(PortDirection::Output) => outbound += 1,
                Some(PortDirection::Inout) => {
                    inbound += 1;
                    outbound += 1;
                }
                None => {}
            }
        }

        let mut on_path = HashSet::new();
        let (depth, _) = self.depth_from(idx, &mut on_path, &mut HashMap::new());

        Some(ModuleComplexity {
            module: node.name.clone(),
            instance_count: node.instances.len(),
            port_count: node.ports.len(),
            inbound_connections: inbound,
            outbound_connections: outbound,
            connection_count: total,
            hierarchy_depth: depth,
        })
    }

    fn depth_from(
        &self,
        node: NodeIndex,
        on_path: &mut HashSet<NodeIndex>,
        memo: &mut HashMap<NodeIndex, usize>,
    ) -> (usize, bool) {
        if let Some(&depth) = memo.get(&node) {
            return (depth, false);
        }

        on_path.insert(node);
        let mut depth = 0;
        let mut cut = false;
        for child in self.child_indices(node) {
            if on_path.contains(&child) {
                cut = true;
                continue;
            }
            let (child_depth, child_cut) = self.depth_from(child, on_path, memo);
            cut |= child_cut;
            depth = depth.max(child_depth + 1);
        }
        on_path.remove(&node);

        if !cut {
            memo.insert(node, depth);
        }
        (depth, cut)
    }

    /// Instance tree rooted at every top-level module. Recursive instantiations are cut.
    pub fn hierarchy(&self) -> Vec<HierarchyNode> {
        self.top_level_indices()
            .into_iter()
            .map(|root| {
                let mut on_path = HashSet::new();
                self.hierarchy_node(root, None, &mut on_path)
            })
            .collect()
    }

    fn hierarchy_node(
        &self,
        idx: NodeIndex,
        instance: Option<String>,
        on_path: &mut HashSet<NodeIndex>,
    ) -> HierarchyNode {
        on_path.insert(idx);
        let node = &self.inner[idx];
        let mut children = Vec::new();
        for inst in &node.instances {
            let Some(&child_idx) = self.by_name.get(&inst.module_type) else {
                continue;
            };
            if on_path.contains(&child_idx) {
                continue;
            }
            children.push(self.hierarchy_node(child_idx, Some(inst.name.clone()), on_path));
        }
        on_path.remove(&idx);

        HierarchyNode {
            module: node.name.clone(),
            instance,
            children,
        }
    }
}

/// The module whose line range holds `line`; the file's first module when none does.
fn enclosing_module<'a>(defs: &[&'a ModuleDefinition], line: u32) -> Option<&'a ModuleDefinition> {
    defs.iter()
        .find(|def| def.contains_line(line))
        .or_else(|| defs.first())
        .copied()
}

/// Rename positional `#N` overrides after the child's N-th parameter.
fn resolve_overrides(
    instance: &mut Instance,
    child: &ModuleNode,
    parent_name: &str,
    diagnostics: &mut Vec<GraphDiagnostic>,
) {
    let overrides = std::mem::take(&mut instance.parameter_overrides);
    for (key, value) in overrides {
        let Some(position) = key.strip_prefix('#').and_then(|n| n.parse::<usize>().ok()) else {
            instance.parameter_overrides.insert(key, value);
            continue;
        };
        match child.parameters.get(position) {
            Some(parameter) => {
                instance.parameter_overrides.insert(parameter.name.clone(), value);
            }
            None => diagnostics.push(GraphDiagnostic::ExtraPositionalOverride {
                parent: parent_name.to_string(),
                instance: instance.name.clone(),
                position,
            }),
        }
    }
}

/// Name positional connections and copy directions from the child's ports.
fn resolve_connections(
    instance: &mut Instance,
    child: &ModuleNode,
    parent_name: &str,
    diagnostics: &mut Vec<GraphDiagnostic>,
) {
    for conn in &mut instance.connections {
        if conn.port_name.is_empty() {
            if let Some(position) = conn.position {
                match child.ports.get(position) {
                    Some(port) => conn.port_name = port.name.clone(),
                    None => {
                        diagnostics.push(GraphDiagnostic::ExtraPositionalConnection {
                            parent: parent_name.to_string(),
                            instance: instance.name.clone(),
                            position,
                        });
                        continue;
                    }
                }
            }
        }
        if let Some(port) = child.port(&conn.port_name) {
            conn.direction = Some(port.direction);
        }
    }
}
