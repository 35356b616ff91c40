//! Core data structures for the symbol index and module graph

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stable identifier for a symbol, derived from its file, name and start line.
///
/// Not globally unique across renames: moving a declaration to another line
/// produces a new id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub String);

impl SymbolId {
    pub fn new(file_path: &Path, name: &str, line: u32) -> Self {
        SymbolId(format!("{}:{}:{}", file_path.display(), name, line))
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discriminates what kind of hardware entity a symbol represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Module,
    Function,
    Task,
    Port,
    /// Nets and variables (`wire`, `reg`, `logic`, ...).
    Signal,
    Instance,
    /// `parameter` / `localparam`.
    Constant,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Module => "module",
            SymbolKind::Function => "function",
            SymbolKind::Task => "task",
            SymbolKind::Port => "port",
            SymbolKind::Signal => "signal",
            SymbolKind::Instance => "instance",
            SymbolKind::Constant => "constant",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SymbolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "module" => Ok(SymbolKind::Module),
            "function" => Ok(SymbolKind::Function),
            "task" => Ok(SymbolKind::Task),
            "port" => Ok(SymbolKind::Port),
            "signal" | "register" | "net" => Ok(SymbolKind::Signal),
            "instance" => Ok(SymbolKind::Instance),
            "constant" | "parameter" => Ok(SymbolKind::Constant),
            other => Err(format!("unknown symbol kind: {other}")),
        }
    }
}

/// Hardware description languages recognised by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Verilog,
    SystemVerilog,
    Other,
}

impl Language {
    /// Detect language from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("v") | Some("vh") => Language::Verilog,
            Some("sv") | Some("svh") => Language::SystemVerilog,
            _ => Language::Other,
        }
    }

    pub fn is_hdl(&self) -> bool {
        !matches!(self, Language::Other)
    }
}

/// Default set of source-file extensions searched and indexed.
pub const SOURCE_EXTENSIONS: &[&str] = &["v", "vh", "sv", "svh"];

/// One named, located entity found in a file. Replaced wholesale, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub repo_root: PathBuf,
    pub file_path: PathBuf,
    pub name: String,
    pub kind: SymbolKind,
    pub line_start: u32,
    /// Equal to `line_start` when the extent is unknown.
    pub line_end: u32,
    /// Opaque tag from the extraction source (e.g. `module_declaration`).
    pub node_type: String,
    /// Hash of `(path, name, line_start)`.
    pub content_hash: u64,
}

impl Symbol {
    pub fn new(repo_root: &Path, file_path: &Path, extracted: &ExtractedSymbol) -> Self {
        let mut hasher = DefaultHasher::new();
        file_path.hash(&mut hasher);
        extracted.name.hash(&mut hasher);
        extracted.line_start.hash(&mut hasher);

        Symbol {
            id: SymbolId::new(file_path, &extracted.name, extracted.line_start),
            repo_root: repo_root.to_path_buf(),
            file_path: file_path.to_path_buf(),
            name: extracted.name.clone(),
            kind: extracted.kind,
            line_start: extracted.line_start,
            line_end: extracted.line_end.max(extracted.line_start),
            node_type: extracted.node_type.clone(),
            content_hash: hasher.finish(),
        }
    }
}

// ── Extraction boundary ────────────────────────────────────

/// A symbol record as produced by an extraction source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub line_start: u32,
    pub line_end: u32,
    pub node_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
    Inout,
}

impl PortDirection {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "input" => Some(PortDirection::Input),
            "output" => Some(PortDirection::Output),
            "inout" => Some(PortDirection::Inout),
            _ => None,
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
            PortDirection::Inout => "inout",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub direction: PortDirection,
    /// Declared net type and packed width, e.g. `wire [7:0]`. Empty if implicit.
    pub data_type: String,
}

/// An overridable `parameter` and its default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub default_value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, default_value: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            default_value: default_value.into(),
        }
    }
}

/// A module declaration with its ordered port list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub name: String,
    pub file_path: PathBuf,
    pub line_start: u32,
    pub line_end: u32,
    pub ports: Vec<Port>,
    /// Overridable parameters in declaration order; `localparam`s are excluded.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl ModuleDefinition {
    /// Default value of the parameter `name`.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.default_value.as_str())
    }

    /// Whether `line` falls inside this declaration's source range.
    pub fn contains_line(&self, line: u32) -> bool {
        line >= self.line_start && line <= self.line_end
    }
}

/// One port-to-signal binding inside an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Port on the child module. Empty for a positional connection until the
    /// graph builder resolves it against the child's port order.
    pub port_name: String,
    /// Signal or expression used at the call site.
    pub signal_name: String,
    /// Copied from the child's port declaration once the child is known.
    pub direction: Option<PortDirection>,
    /// Zero-based slot for positional connections.
    #[serde(default)]
    pub position: Option<usize>,
}

impl Connection {
    pub fn named(port_name: impl Into<String>, signal_name: impl Into<String>) -> Self {
        Connection {
            port_name: port_name.into(),
            signal_name: signal_name.into(),
            direction: None,
            position: None,
        }
    }

    pub fn positional(position: usize, signal_name: impl Into<String>) -> Self {
        Connection {
            port_name: String::new(),
            signal_name: signal_name.into(),
            direction: None,
            position: Some(position),
        }
    }

    pub fn with_direction(mut self, direction: PortDirection) -> Self {
        self.direction = Some(direction);
        self
    }
}

/// One instantiation statement inside a parent module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub module_type: String,
    pub connections: Vec<Connection>,
    /// `#(...)` overrides at this site. Positional overrides are keyed `#0`, `#1`, ...
    /// until the graph builder names them after the child's parameter order.
    #[serde(default)]
    pub parameter_overrides: BTreeMap<String, String>,
    pub file_path: PathBuf,
    pub line: u32,
}

/// Everything an extraction source reports for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileExtraction {
    pub symbols: Vec<ExtractedSymbol>,
    pub modules: Vec<ModuleDefinition>,
    pub instances: Vec<Instance>,
}

impl FileExtraction {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.modules.is_empty() && self.instances.is_empty()
    }
}

// ── Module graph ───────────────────────────────────────────

/// Aggregated view of one module definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleNode {
    pub name: String,
    pub file_path: PathBuf,
    pub line_start: u32,
    pub line_end: u32,
    pub ports: Vec<Port>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Instances physically nested in this module's source.
    pub instances: Vec<Instance>,
    /// Overrides applied where this module is instantiated.
    pub parameter_overrides: BTreeMap<String, String>,
}

impl ModuleNode {
    pub fn from_definition(def: &ModuleDefinition) -> Self {
        ModuleNode {
            name: def.name.clone(),
            file_path: def.file_path.clone(),
            line_start: def.line_start,
            line_end: def.line_end,
            ports: def.ports.clone(),
            parameters: def.parameters.clone(),
            instances: Vec::new(),
            parameter_overrides: BTreeMap::new(),
        }
    }

    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }
}

/// Edge weight of the instantiation graph: one edge per distinct child type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instantiation {
    /// Number of instances of the child type inside the parent.
    pub instance_count: u32,
    pub instance_names: Vec<String>,
}

/// A module port (or, on the parent side, the local signal) touched by a flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalEndpoint {
    pub module: String,
    /// Set when the endpoint is a child instance's port.
    pub instance: Option<String>,
    pub port: String,
}

/// A signal crossing exactly one instantiation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalFlowEdge {
    pub from: SignalEndpoint,
    pub to: SignalEndpoint,
    pub signal: String,
    /// `[parent, child]`.
    pub path: Vec<String>,
}

/// Non-fatal findings recorded while building the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphDiagnostic {
    DuplicateModule {
        name: String,
        kept: PathBuf,
        ignored: PathBuf,
    },
    OrphanInstance {
        instance: String,
        file_path: PathBuf,
        line: u32,
    },
    UnresolvedModule {
        parent: String,
        instance: String,
        module_type: String,
    },
    ExtraPositionalConnection {
        parent: String,
        instance: String,
        position: usize,
    },
    ExtraPositionalOverride {
        parent: String,
        instance: String,
        position: usize,
    },
    /// An instance inside a module definition that lost to an earlier duplicate.
    ShadowedInstance {
        instance: String,
        module: String,
        file_path: PathBuf,
        line: u32,
    },
}

impl fmt::Display for GraphDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphDiagnostic::DuplicateModule { name, kept, ignored } => write!(
                f,
                "module {name} declared twice; kept {}, ignored {}",
                kept.display(),
                ignored.display()
            ),
            GraphDiagnostic::OrphanInstance { instance, file_path, line } => write!(
                f,
                "instance {instance} at {}:{line} has no enclosing module",
                file_path.display()
            ),
            GraphDiagnostic::UnresolvedModule { parent, instance, module_type } => write!(
                f,
                "{parent}.{instance} instantiates unknown module {module_type}"
            ),
            GraphDiagnostic::ExtraPositionalConnection { parent, instance, position } => write!(
                f,
                "{parent}.{instance} connects positional slot {position} beyond the child's ports"
            ),
            GraphDiagnostic::ExtraPositionalOverride { parent, instance, position } => write!(
                f,
                "{parent}.{instance} overrides positional parameter {position} beyond the child's parameters"
            ),
            GraphDiagnostic::ShadowedInstance { instance, module, file_path, line } => write!(
                f,
                "instance {instance} at {}:{line} belongs to an ignored duplicate of {module}",
                file_path.display()
            ),
        }
    }
}

/// Hash file content for change detection.
pub fn compute_content_hash(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}
