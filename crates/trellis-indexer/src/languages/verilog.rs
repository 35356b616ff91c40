//! Verilog / SystemVerilog extractor using tree-sitter
//!
//! Each `module_declaration` is walked for ports, nets, parameters,
//! functions, tasks and instantiations. Names are taken by shape (the
//! shallowest identifier of a node) rather than by field name, since the
//! grammar exposes few fields.

use crate::extractor::SymbolExtractor;
use anyhow::Context;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tree_sitter::{Node, Parser, Point};
use trellis_core::{
    Connection, ExtractedSymbol, FileExtraction, Instance, ModuleDefinition, Parameter, Port,
    PortDirection, SymbolKind,
};

pub struct VerilogExtractor;

impl SymbolExtractor for VerilogExtractor {
    fn extract(&self, path: &Path, content: &str) -> anyhow::Result<FileExtraction> {
        let language: tree_sitter::Language = tree_sitter_verilog::LANGUAGE.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .context("Verilog grammar version mismatch")?;
        let tree = parser
            .parse(content, None)
            .with_context(|| format!("tree-sitter returned no tree for {}", path.display()))?;

        let mut walker = FileWalker {
            path,
            src: content,
            out: FileExtraction::default(),
        };
        walker.walk_file(tree.root_node());
        Ok(walker.out)
    }
}

const NODE_MODULE: &str = "module_declaration";
const NODE_PORT: &str = "port_declaration";
const NODE_NET: &str = "net_declaration";
const NODE_PARAMETER: &str = "parameter_declaration";
const NODE_FUNCTION: &str = "function_declaration";
const NODE_TASK: &str = "task_declaration";
const NODE_INSTANCE: &str = "module_instantiation";

/// Statements that place named instances of another design unit.
const INSTANTIATIONS: &[&str] = &[
    "module_instantiation",
    "udp_instantiation",
    "interface_instantiation",
    "program_instantiation",
    "checker_instantiation",
];

/// One instance inside an instantiation statement.
const INSTANCE_NODES: &[&str] = &["hierarchical_instance", "udp_instance"];

/// Parts of an instantiation that never hold the instantiated type's name.
const INSTANCE_PARTS: &[&str] = &[
    "parameter_value_assignment",
    "hierarchical_instance",
    "udp_instance",
    "name_of_instance",
    "list_of_port_connections",
    "list_of_checker_port_connections",
    "delay2",
    "drive_strength",
];

/// Module items whose contents declare nothing at module scope.
const OPAQUE: &[&str] = &[
    "always_construct",
    "initial_construct",
    "final_construct",
    "continuous_assign",
    "class_declaration",
    "covergroup_declaration",
    "property_declaration",
    "sequence_declaration",
    "clocking_declaration",
    "specify_block",
    "dpi_import_export",
    "interface_declaration",
    "program_declaration",
    "checker_declaration",
    "attribute_instance",
];

/// Header lists searched past when looking for a module's name.
const HEADER_LISTS: &[&str] = &[
    "parameter_port_list",
    "list_of_ports",
    "list_of_port_declarations",
    "package_import_declaration",
];

fn point_to_line(point: Point) -> u32 {
    (point.row as u32) + 1
}

fn is_identifier(node: Node<'_>) -> bool {
    let kind = node.kind();
    kind == "simple_identifier"
        || kind == "escaped_identifier"
        || (kind.ends_with("_identifier") && kind != "system_tf_identifier")
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    named_children(node).into_iter().find(|c| c.kind() == kind)
}

/// First `list_of_*` child, the usual holder of a declaration's names.
fn list_child<'t>(node: Node<'t>) -> Option<Node<'t>> {
    named_children(node)
        .into_iter()
        .find(|c| c.kind().starts_with("list_of_"))
}

/// The shallowest identifier under `node`.
///
/// Only children before an `=` token are searched, and subtrees whose kind is
/// in `skip` are not entered. With `last`, the rightmost hit at that depth wins.
fn find_name<'t>(node: Node<'t>, last: bool, skip: &[&str]) -> Option<Node<'t>> {
    let mut level: Vec<Node<'t>> = {
        let mut cursor = node.walk();
        node.children(&mut cursor)
            .take_while(|c| c.kind() != "=")
            .filter(|c| c.is_named())
            .collect()
    };

    while !level.is_empty() {
        let mut hits = level.iter().copied().filter(|n| is_identifier(*n));
        let hit = if last { hits.last() } else { hits.next() };
        if hit.is_some() {
            return hit;
        }
        level = level
            .into_iter()
            .filter(|n| !skip.contains(&n.kind()) && n.kind() != "attribute_instance")
            .flat_map(named_children)
            .collect();
    }
    None
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `input wire [7:0]` into its direction and the data type after it.
fn split_direction(prefix: &str) -> (Option<PortDirection>, String) {
    let mut words: Vec<&str> = prefix.split_whitespace().collect();
    let direction = match words.first().copied() {
        Some("ref") => Some(PortDirection::Inout),
        Some(word) => PortDirection::from_keyword(word),
        None => None,
    };
    if direction.is_some() {
        words.remove(0);
    }
    (direction, words.join(" "))
}

fn symbol(name: &str, kind: SymbolKind, line_start: u32, line_end: u32, node_type: &str) -> ExtractedSymbol {
    ExtractedSymbol {
        name: name.to_string(),
        kind,
        line_start,
        line_end,
        node_type: node_type.to_string(),
    }
}

/// A port named in the module header, before body declarations are applied.
struct HeaderPort {
    name: String,
    line: u32,
    direction: Option<PortDirection>,
    /// `None` when the entry carried no direction or type of its own.
    data_type: Option<String>,
}

struct ModuleScope<'t> {
    def: ModuleDefinition,
    symbols: Vec<ExtractedSymbol>,
    header: Vec<HeaderPort>,
    /// Body declarations: name -> (port, line)
    declared: HashMap<String, (Port, u32)>,
    declared_order: Vec<String>,
    instances: Vec<Instance>,
    nested: Vec<Node<'t>>,
}

struct FileWalker<'a> {
    path: &'a Path,
    src: &'a str,
    out: FileExtraction,
}

impl<'a> FileWalker<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        self.src.get(node.byte_range()).unwrap_or_default()
    }

    fn name_of(&self, node: Node<'_>) -> String {
        self.text(node).trim().to_string()
    }

    /// Collapsed text strictly between a node's first `(` and last `)`.
    /// `None` when the node has no parentheses.
    fn parenthesized(&self, node: Node<'_>) -> Option<String> {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        let open = children.iter().find(|c| c.kind() == "(")?;
        let close = children.iter().rev().find(|c| c.kind() == ")")?;
        let inner = self
            .src
            .get(open.end_byte()..close.start_byte())
            .unwrap_or_default();
        Some(collapse(inner))
    }

    fn walk_file(&mut self, node: Node<'_>) {
        for child in named_children(node) {
            match child.kind() {
                "module_declaration" => self.module(child),
                "function_declaration" | "task_declaration" => {
                    if let Some(symbol) = self.subroutine(child) {
                        self.out.symbols.push(symbol);
                    }
                }
                _ => self.walk_file(child),
            }
        }
    }

    fn module(&mut self, node: Node<'_>) {
        let header = named_children(node)
            .into_iter()
            .find(|c| c.kind().contains("header"))
            .unwrap_or(node);
        let Some(name_node) = find_name(header, false, HEADER_LISTS) else {
            return;
        };
        let name = self.name_of(name_node);
        let line_start = point_to_line(node.start_position());
        let line_end = point_to_line(node.end_position());

        let mut scope = ModuleScope {
            def: ModuleDefinition {
                name: name.clone(),
                file_path: self.path.to_path_buf(),
                line_start,
                line_end,
                ports: Vec::new(),
                parameters: Vec::new(),
            },
            symbols: Vec::new(),
            header: Vec::new(),
            declared: HashMap::new(),
            declared_order: Vec::new(),
            instances: Vec::new(),
            nested: Vec::new(),
        };
        self.walk_scope(node, false, &mut scope);
        let mut port_symbols = self.finish_ports(&mut scope);

        self.out
            .symbols
            .push(symbol(&name, SymbolKind::Module, line_start, line_end, NODE_MODULE));
        self.out.symbols.append(&mut port_symbols);
        self.out.symbols.append(&mut scope.symbols);
        self.out.instances.append(&mut scope.instances);
        self.out.modules.push(scope.def);

        for nested in scope.nested {
            self.module(nested);
        }
    }

    fn walk_scope<'t>(&self, node: Node<'t>, local: bool, scope: &mut ModuleScope<'t>) {
        for child in named_children(node) {
            match child.kind() {
                "module_declaration" => scope.nested.push(child),
                "function_declaration" | "task_declaration" => {
                    scope.symbols.extend(self.subroutine(child));
                }
                "list_of_ports" => self.header_ports(child, scope),
                "ansi_port_declaration" => self.ansi_port(child, scope),
                "input_declaration" | "output_declaration" | "inout_declaration" | "ref_declaration" => {
                    self.body_ports(child, scope)
                }
                "net_decl_assignment" | "variable_decl_assignment" => self.net(child, scope),
                "param_assignment" => self.parameter(child, local, scope),
                "local_parameter_declaration" => self.walk_scope(child, true, scope),
                kind if INSTANTIATIONS.contains(&kind) => self.instantiation(child, scope),
                kind if OPAQUE.contains(&kind) => {}
                _ => self.walk_scope(child, local, scope),
            }
        }
    }

    // ── declarations ──

    fn subroutine(&self, node: Node<'_>) -> Option<ExtractedSymbol> {
        let (kind, node_type) = if node.kind() == "function_declaration" {
            (SymbolKind::Function, NODE_FUNCTION)
        } else {
            (SymbolKind::Task, NODE_TASK)
        };
        let name = find_name(node, false, &[])?;
        Some(symbol(
            &self.name_of(name),
            kind,
            point_to_line(node.start_position()),
            point_to_line(node.end_position()),
            node_type,
        ))
    }

    /// Non-ANSI header: `module m (a, b, c);`
    fn header_ports(&self, list: Node<'_>, scope: &mut ModuleScope<'_>) {
        for entry in named_children(list) {
            let Some(name) = find_name(entry, false, &[]) else {
                continue;
            };
            scope.header.push(HeaderPort {
                name: self.name_of(name),
                line: point_to_line(name.start_position()),
                direction: None,
                data_type: None,
            });
        }
    }

    /// ANSI header entry: `input wire [7:0] a`
    fn ansi_port(&self, node: Node<'_>, scope: &mut ModuleScope<'_>) {
        let Some(name) = find_name(node, true, &[]) else {
            return;
        };
        let prefix = self
            .src
            .get(node.start_byte()..name.start_byte())
            .unwrap_or_default();
        let (direction, data_type) = split_direction(prefix);
        let own_type = !prefix.trim().is_empty();
        scope.header.push(HeaderPort {
            name: self.name_of(name),
            line: point_to_line(name.start_position()),
            direction,
            data_type: own_type.then_some(data_type),
        });
    }

    /// Body declaration: `input [7:0] a, b;`
    fn body_ports(&self, node: Node<'_>, scope: &mut ModuleScope<'_>) {
        let holder = list_child(node).unwrap_or(node);
        let mut names: Vec<Node<'_>> = named_children(holder)
            .into_iter()
            .filter(|c| is_identifier(*c))
            .collect();
        if names.is_empty() {
            names = named_children(holder)
                .into_iter()
                .filter(|c| !c.kind().contains("dimension"))
                .filter_map(|c| find_name(c, false, &[]))
                .collect();
        }
        let Some(first) = names.first() else {
            return;
        };

        let prefix = self
            .src
            .get(node.start_byte()..first.start_byte())
            .unwrap_or_default();
        let (direction, data_type) = split_direction(prefix);
        let direction = direction.unwrap_or(PortDirection::Inout);
        let line = point_to_line(node.start_position());

        for name in names {
            let name = self.name_of(name);
            if !scope.declared.contains_key(&name) {
                scope.declared_order.push(name.clone());
            }
            let port = Port {
                name: name.clone(),
                direction,
                data_type: data_type.clone(),
            };
            scope.declared.insert(name, (port, line));
        }
    }

    fn net(&self, node: Node<'_>, scope: &mut ModuleScope<'_>) {
        if let Some(name) = find_name(node, false, &[]) {
            let line = point_to_line(name.start_position());
            scope
                .symbols
                .push(symbol(&self.name_of(name), SymbolKind::Signal, line, line, NODE_NET));
        }
    }

    /// `NAME = value`; overridable unless declared with `localparam`.
    fn parameter(&self, node: Node<'_>, local: bool, scope: &mut ModuleScope<'_>) {
        let Some(name) = find_name(node, false, &[]) else {
            return;
        };
        let name_text = self.name_of(name);
        let line = point_to_line(name.start_position());
        scope
            .symbols
            .push(symbol(&name_text, SymbolKind::Constant, line, line, NODE_PARAMETER));

        if !local {
            let mut cursor = node.walk();
            let eq = node.children(&mut cursor).find(|c| c.kind() == "=");
            let value = eq
                .and_then(|eq| self.src.get(eq.end_byte()..node.end_byte()))
                .map(collapse)
                .unwrap_or_default();
            scope.def.parameters.push(Parameter::new(name_text, value));
        }
    }

    // ── instantiations ──

    fn instantiation(&self, stmt: Node<'_>, scope: &mut ModuleScope<'_>) {
        let Some(type_node) = find_name(stmt, false, INSTANCE_PARTS) else {
            return;
        };
        let module_type = self.name_of(type_node);
        let overrides = self.overrides(stmt);
        let line = point_to_line(stmt.start_position());

        let mut targets: Vec<Node<'_>> = named_children(stmt)
            .into_iter()
            .filter(|c| INSTANCE_NODES.contains(&c.kind()))
            .collect();
        if targets.is_empty() {
            targets.push(stmt);
        }

        for target in targets {
            // Unnamed primitive instances have nothing to index.
            let Some(name) = child_of_kind(target, "name_of_instance")
                .and_then(|n| find_name(n, false, &[]))
            else {
                continue;
            };
            let name = self.name_of(name);
            scope
                .symbols
                .push(symbol(&name, SymbolKind::Instance, line, line, NODE_INSTANCE));
            scope.instances.push(Instance {
                name,
                module_type: module_type.clone(),
                connections: self.connections(target),
                parameter_overrides: overrides.clone(),
                file_path: self.path.to_path_buf(),
                line,
            });
        }
    }

    /// Port connections of one instance. Empty positional slots still advance
    /// the position; `.*` and empty `.port()` connections are dropped.
    fn connections(&self, target: Node<'_>) -> Vec<Connection> {
        let list = list_child(target);
        let holder = list.unwrap_or(target);
        let mut connections = Vec::new();
        let mut position = 0;

        let mut cursor = holder.walk();
        for child in holder.children(&mut cursor) {
            let kind = child.kind();
            if kind == "," {
                position += 1;
            } else if kind.starts_with("named_") {
                connections.extend(self.named_connection(child));
            } else if kind.starts_with("ordered_")
                || kind.ends_with("_terminal")
                || (list.is_some() && child.is_named() && kind != "attribute_instance")
            {
                let signal = collapse(self.text(child));
                if !signal.is_empty() {
                    connections.push(Connection::positional(position, signal));
                }
            }
        }
        connections
    }

    fn named_connection(&self, node: Node<'_>) -> Option<Connection> {
        if self.text(node).trim() == ".*" {
            return None;
        }
        let port = self.name_of(find_name(node, false, &[])?);
        match self.parenthesized(node) {
            None => Some(Connection::named(port.clone(), port)),
            Some(signal) if signal.is_empty() => None,
            Some(signal) => Some(Connection::named(port, signal)),
        }
    }

    /// `#(...)` overrides; positional ones are keyed `#0`, `#1`, ...
    fn overrides(&self, stmt: Node<'_>) -> BTreeMap<String, String> {
        let mut overrides = BTreeMap::new();
        let Some(assignment) = child_of_kind(stmt, "parameter_value_assignment") else {
            return overrides;
        };
        let holder = list_child(assignment).unwrap_or(assignment);
        let mut position = 0;

        let mut cursor = holder.walk();
        for child in holder.children(&mut cursor) {
            match child.kind() {
                "," => position += 1,
                "named_parameter_assignment" => {
                    let Some(name) = find_name(child, false, &[]) else {
                        continue;
                    };
                    if let Some(value) = self.parenthesized(child).filter(|v| !v.is_empty()) {
                        overrides.insert(self.name_of(name), value);
                    }
                }
                "ordered_parameter_assignment" => {
                    let value = collapse(self.text(child));
                    if !value.is_empty() {
                        overrides.insert(format!("#{position}"), value);
                    }
                }
                _ => {}
            }
        }
        overrides
    }

    // ── ports ──

    /// Resolve header entries against body declarations and return the port symbols.
    ///
    /// A header whose first entry has a direction is ANSI style, and later
    /// entries without one inherit from the entry before. Otherwise each header
    /// name takes its body declaration, or `inout` with no type when undeclared.
    fn finish_ports(&self, scope: &mut ModuleScope<'_>) -> Vec<ExtractedSymbol> {
        let header = std::mem::take(&mut scope.header);
        let ansi = header.first().is_some_and(|p| p.direction.is_some());
        let mut resolved: Vec<(Port, u32)> = Vec::new();

        if ansi {
            let mut direction = PortDirection::Inout;
            let mut data_type = String::new();
            for entry in header {
                if let Some(own) = entry.direction {
                    direction = own;
                }
                if let Some(own) = entry.data_type {
                    data_type = own;
                }
                let port = Port {
                    name: entry.name,
                    direction,
                    data_type: data_type.clone(),
                };
                resolved.push((port, entry.line));
            }
        } else {
            for entry in header {
                let declared = scope.declared.remove(&entry.name).unwrap_or_else(|| {
                    let port = Port {
                        name: entry.name.clone(),
                        direction: PortDirection::Inout,
                        data_type: String::new(),
                    };
                    (port, entry.line)
                });
                resolved.push(declared);
            }
        }

        // Declarations with no header entry.
        for name in std::mem::take(&mut scope.declared_order) {
            if let Some(declared) = scope.declared.remove(&name) {
                if resolved.iter().all(|(p, _)| p.name != declared.0.name) {
                    resolved.push(declared);
                }
            }
        }

        resolved
            .into_iter()
            .map(|(port, line)| {
                let port_symbol = symbol(&port.name, SymbolKind::Port, line, line, NODE_PORT);
                scope.def.ports.push(port);
                port_symbol
            })
            .collect()
    }
}
