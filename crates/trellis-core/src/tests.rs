//! Unit tests for trellis-core module

use crate::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

fn port(name: &str, direction: PortDirection) -> Port {
    Port {
        name: name.to_string(),
        direction,
        data_type: String::new(),
    }
}

fn module(name: &str, file: &str, lines: (u32, u32), ports: Vec<Port>) -> ModuleDefinition {
    ModuleDefinition {
        name: name.to_string(),
        file_path: PathBuf::from(file),
        line_start: lines.0,
        line_end: lines.1,
        ports,
        parameters: Vec::new(),
    }
}

fn instance(name: &str, module_type: &str, file: &str, line: u32, connections: Vec<Connection>) -> Instance {
    Instance {
        name: name.to_string(),
        module_type: module_type.to_string(),
        connections,
        parameter_overrides: BTreeMap::new(),
        file_path: PathBuf::from(file),
        line,
    }
}

fn extracted(name: &str, kind: SymbolKind, line: u32) -> ExtractedSymbol {
    ExtractedSymbol {
        name: name.to_string(),
        kind,
        line_start: line,
        line_end: line,
        node_type: "test".to_string(),
    }
}

fn extraction(symbols: Vec<ExtractedSymbol>) -> FileExtraction {
    FileExtraction {
        symbols,
        ..Default::default()
    }
}

/// `alu` in a.v, `cpu_core` in b.v instantiating it as `u_alu`.
fn alu_system() -> (Vec<ModuleDefinition>, Vec<Instance>) {
    let modules = vec![
        module(
            "alu",
            "a.v",
            (1, 6),
            vec![
                port("a", PortDirection::Input),
                port("b", PortDirection::Input),
                port("result", PortDirection::Output),
            ],
        ),
        module("cpu_core", "b.v", (1, 12), vec![port("clk", PortDirection::Input)]),
    ];
    let instances = vec![instance(
        "u_alu",
        "alu",
        "b.v",
        5,
        vec![Connection::named("result", "alu_result")],
    )];
    (modules, instances)
}

/// top -> cpu -> alu, top -> mem
fn three_level() -> ModuleGraph {
    let modules = vec![
        module("top", "top.v", (1, 20), vec![]),
        module("cpu", "cpu.v", (1, 20), vec![]),
        module("alu", "alu.v", (1, 5), vec![]),
        module("mem", "mem.v", (1, 5), vec![]),
    ];
    let instances = vec![
        instance("u_cpu", "cpu", "top.v", 3, vec![]),
        instance("u_mem", "mem", "top.v", 4, vec![]),
        instance("u_alu", "alu", "cpu.v", 3, vec![]),
    ];
    ModuleGraph::build(&modules, &instances)
}

// ── Symbol table ────────────────────────────────────────

#[test]
fn test_symbol_id_is_deterministic() {
    let path = Path::new("rtl/alu.v");
    assert_eq!(SymbolId::new(path, "alu", 3), SymbolId::new(path, "alu", 3));
    assert_ne!(SymbolId::new(path, "alu", 3), SymbolId::new(path, "alu", 4));
    assert_eq!(SymbolId::new(path, "alu", 3).to_string(), "rtl/alu.v:alu:3");
}

#[test]
fn test_symbol_kind_parsing() {
    assert_eq!("module".parse::<SymbolKind>(), Ok(SymbolKind::Module));
    assert_eq!("register".parse::<SymbolKind>(), Ok(SymbolKind::Signal));
    assert_eq!("parameter".parse::<SymbolKind>(), Ok(SymbolKind::Constant));
    assert!("class".parse::<SymbolKind>().is_err());
}

#[test]
fn test_replace_file_does_not_accumulate() {
    let mut table = SymbolTable::new("/repo");
    let path = Path::new("/repo/alu.v");

    table.replace_file(
        path,
        extraction(vec![
            extracted("alu", SymbolKind::Module, 1),
            extracted("carry", SymbolKind::Signal, 4),
        ]),
        Some(1),
    );
    let delta = table.replace_file(
        path,
        extraction(vec![extracted("alu", SymbolKind::Module, 1)]),
        Some(2),
    );

    let names: Vec<String> = table
        .get_symbols_in_file(path)
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["alu"]);
    assert!(table.find_by_name("carry").is_empty());
    assert_eq!(delta.removed.len(), 1);
    assert!(delta.added.is_empty());
    assert_eq!(table.content_hash(path), Some(2));
}

#[test]
fn test_replace_file_is_idempotent() {
    let mut table = SymbolTable::new("/repo");
    let path = Path::new("/repo/alu.v");
    let content = || extraction(vec![extracted("alu", SymbolKind::Module, 1)]);

    table.replace_file(path, content(), None);
    let first = table.list_symbols();
    let delta = table.replace_file(path, content(), None);

    assert_eq!(table.list_symbols(), first);
    assert!(delta.is_empty());
    assert_eq!(table.len(), 1);
}

#[test]
fn test_list_symbols_orders_by_file_then_line() {
    let mut table = SymbolTable::new("/repo");
    table.replace_file(
        Path::new("/repo/b.v"),
        extraction(vec![
            extracted("top", SymbolKind::Module, 1),
            extracted("u_core", SymbolKind::Instance, 9),
            extracted("clk", SymbolKind::Port, 2),
        ]),
        None,
    );
    table.replace_file(
        Path::new("/repo/a.v"),
        extraction(vec![
            extracted("alu", SymbolKind::Module, 1),
            extracted("WIDTH", SymbolKind::Constant, 3),
            extracted("carry", SymbolKind::Signal, 2),
        ]),
        None,
    );

    let order: Vec<String> = table.list_symbols().into_iter().map(|s| s.name).collect();
    assert_eq!(order, vec!["alu", "carry", "WIDTH", "top", "clk", "u_core"]);
}

#[test]
fn test_find_by_name_spans_files() {
    let mut table = SymbolTable::new("/repo");
    table.replace_file(
        Path::new("/repo/b.v"),
        extraction(vec![extracted("alu", SymbolKind::Instance, 7)]),
        None,
    );
    table.replace_file(
        Path::new("/repo/a.v"),
        extraction(vec![extracted("alu", SymbolKind::Module, 1)]),
        None,
    );

    let found = table.find_by_name("alu");
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].kind, SymbolKind::Module);
    assert_eq!(found[1].kind, SymbolKind::Instance);
    assert!(table.find_by_name("ALU").is_empty());
}

#[test]
fn test_empty_files_are_tracked() {
    let mut table = SymbolTable::new("/repo");
    table.replace_file(Path::new("/repo/empty.v"), FileExtraction::default(), None);

    assert!(table.is_empty());
    assert_eq!(table.get_all_files(), vec![PathBuf::from("/repo/empty.v")]);
}

#[test]
fn test_remove_file() {
    let mut table = SymbolTable::new("/repo");
    let path = Path::new("/repo/alu.v");
    table.replace_file(
        path,
        extraction(vec![extracted("alu", SymbolKind::Module, 1)]),
        None,
    );
    let id = SymbolId::new(path, "alu", 1);
    assert!(table.get_symbol(&id).is_some());

    let delta = table.remove_file(path).unwrap();
    assert_eq!(delta.removed, vec![id.clone()]);
    assert!(table.get_symbol(&id).is_none());
    assert!(table.remove_file(path).is_none());
    assert!(table.get_all_files().is_empty());
}

#[test]
fn test_sequence_increases_per_change() {
    let mut table = SymbolTable::new("/repo");
    let a = table.replace_file(Path::new("a.v"), FileExtraction::default(), None);
    let b = table.replace_file(Path::new("b.v"), FileExtraction::default(), None);
    assert!(b.sequence > a.sequence);
    assert_eq!(table.sequence(), b.sequence);
}

// ── Module graph ────────────────────────────────────────

#[test]
fn test_two_file_system() {
    let (modules, instances) = alu_system();
    let graph = ModuleGraph::build(&modules, &instances);

    assert_eq!(graph.module_names(), vec!["alu", "cpu_core"]);
    assert_eq!(graph.children("cpu_core"), vec!["alu"]);
    assert_eq!(graph.parents("alu"), vec!["cpu_core"]);
    assert_eq!(graph.top_level_modules(), vec!["cpu_core"]);
    assert_eq!(graph.leaf_modules(), vec!["alu"]);

    let flows = graph.signal_flows();
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].signal, "alu_result");
    assert_eq!(flows[0].from.module, "alu");
    assert_eq!(flows[0].from.instance.as_deref(), Some("u_alu"));
    assert_eq!(flows[0].to.module, "cpu_core");
    assert_eq!(flows[0].path, vec!["cpu_core", "alu"]);

    let parent = graph.module("cpu_core").unwrap();
    assert_eq!(parent.instances[0].connections[0].direction, Some(PortDirection::Output));
}

#[test]
fn test_forward_and_reverse_edges_are_symmetric() {
    let graph = three_level();
    let forward = graph.forward_edges();
    let reverse = graph.reverse_edges();

    for (parent, children) in &forward {
        for child in children {
            let back = &reverse[child];
            assert_eq!(back.iter().filter(|p| *p == parent).count(), 1);
        }
    }
    let forward_total: usize = forward.values().map(Vec::len).sum();
    let reverse_total: usize = reverse.values().map(Vec::len).sum();
    assert_eq!(forward_total, reverse_total);
    assert_eq!(forward_total, graph.edge_count());
}

#[test]
fn test_one_edge_per_child_type() {
    let modules = vec![
        module("top", "top.v", (1, 20), vec![]),
        module("reg8", "reg8.v", (1, 5), vec![]),
    ];
    let instances = vec![
        instance("r0", "reg8", "top.v", 3, vec![]),
        instance("r1", "reg8", "top.v", 4, vec![]),
    ];
    let graph = ModuleGraph::build(&modules, &instances);

    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.module("top").unwrap().instances.len(), 2);
    assert_eq!(graph.module_complexity("top").unwrap().instance_count, 2);
}

#[test]
fn test_parent_resolved_by_line_range() {
    let modules = vec![
        module("first", "multi.v", (1, 10), vec![]),
        module("second", "multi.v", (12, 30), vec![]),
        module("leaf", "leaf.v", (1, 3), vec![]),
    ];
    let instances = vec![instance("u_leaf", "leaf", "multi.v", 20, vec![])];
    let graph = ModuleGraph::build(&modules, &instances);

    assert_eq!(graph.parents("leaf"), vec!["second"]);
    assert!(graph.module("first").unwrap().instances.is_empty());
}

#[test]
fn test_parent_falls_back_to_first_module_in_file() {
    let modules = vec![
        module("first", "multi.v", (1, 10), vec![]),
        module("second", "multi.v", (12, 30), vec![]),
        module("leaf", "leaf.v", (1, 3), vec![]),
    ];
    let instances = vec![instance("u_leaf", "leaf", "multi.v", 40, vec![])];
    let graph = ModuleGraph::build(&modules, &instances);

    assert_eq!(graph.parents("leaf"), vec!["first"]);
}

#[test]
fn test_orphan_instance_is_diagnosed() {
    let modules = vec![module("leaf", "leaf.v", (1, 3), vec![])];
    let instances = vec![instance("u_leaf", "leaf", "stray.v", 2, vec![])];
    let graph = ModuleGraph::build(&modules, &instances);

    assert_eq!(graph.edge_count(), 0);
    assert!(matches!(
        graph.diagnostics(),
        [GraphDiagnostic::OrphanInstance { instance, .. }] if instance == "u_leaf"
    ));
}

#[test]
fn test_unresolved_module_is_external() {
    let modules = vec![module("top", "top.v", (1, 10), vec![])];
    let instances = vec![instance(
        "u_pll",
        "vendor_pll",
        "top.v",
        4,
        vec![Connection::named("clk_out", "clk")],
    )];
    let graph = ModuleGraph::build(&modules, &instances);

    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.external_references("top"), vec!["vendor_pll"]);
    assert_eq!(graph.leaf_modules(), vec!["top"]);
    assert!(graph.signal_flows().is_empty());
    assert_eq!(graph.module("top").unwrap().instances.len(), 1);
    assert!(graph
        .diagnostics()
        .iter()
        .any(|d| matches!(d, GraphDiagnostic::UnresolvedModule { module_type, .. } if module_type == "vendor_pll")));
}

#[test]
fn test_duplicate_module_keeps_first() {
    let modules = vec![
        module("alu", "a.v", (1, 5), vec![port("x", PortDirection::Input)]),
        module("alu", "old/a.v", (1, 5), vec![]),
    ];
    let graph = ModuleGraph::build(&modules, &[]);

    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.module("alu").unwrap().ports.len(), 1);
    assert!(matches!(
        graph.diagnostics(),
        [GraphDiagnostic::DuplicateModule { ignored, .. }] if ignored == Path::new("old/a.v")
    ));
}

#[test]
fn test_instances_in_ignored_duplicate_are_not_grafted() {
    let modules = vec![
        module("alu", "a.v", (1, 5), vec![]),
        module("alu", "old/a.v", (1, 8), vec![]),
        module("mul", "mul.v", (1, 4), vec![]),
    ];
    let instances = vec![instance("u_mul", "mul", "old/a.v", 3, vec![])];
    let graph = ModuleGraph::build(&modules, &instances);

    assert!(graph.children("alu").is_empty());
    assert!(graph.module("alu").unwrap().instances.is_empty());
    assert_eq!(graph.parents("mul"), Vec::<String>::new());
    assert!(graph.diagnostics().iter().any(|d| matches!(
        d,
        GraphDiagnostic::ShadowedInstance { instance, module, line: 3, .. }
            if instance == "u_mul" && module == "alu"
    )));
}

#[test]
fn test_positional_and_inout_connections() {
    let modules = vec![
        module("top", "top.v", (1, 20), vec![]),
        module(
            "pad",
            "pad.v",
            (1, 8),
            vec![port("en", PortDirection::Input), port("io", PortDirection::Inout)],
        ),
    ];
    let instances = vec![instance(
        "u_pad",
        "pad",
        "top.v",
        5,
        vec![
            Connection::positional(0, "pad_en"),
            Connection::positional(1, "pin"),
            Connection::positional(2, "spare"),
        ],
    )];
    let graph = ModuleGraph::build(&modules, &instances);

    let resolved = &graph.module("top").unwrap().instances[0].connections;
    assert_eq!(resolved[0].port_name, "en");
    assert_eq!(resolved[1].port_name, "io");
    assert!(resolved[2].port_name.is_empty());

    let pin_flows: Vec<_> = graph.signal_flows().iter().filter(|f| f.signal == "pin").collect();
    assert_eq!(pin_flows.len(), 2);
    assert_eq!(graph.signal_flows().len(), 3);

    assert!(graph.diagnostics().iter().any(|d| matches!(
        d,
        GraphDiagnostic::ExtraPositionalConnection { position: 2, .. }
    )));
}

#[test]
fn test_parameter_overrides_merge_into_child() {
    let modules = vec![
        module("top", "top.v", (1, 20), vec![]),
        module("fifo", "fifo.v", (1, 8), vec![]),
    ];
    let mut first = instance("u_a", "fifo", "top.v", 3, vec![]);
    first.parameter_overrides.insert("DEPTH".into(), "16".into());
    first.parameter_overrides.insert("WIDTH".into(), "8".into());
    let mut second = instance("u_b", "fifo", "top.v", 4, vec![]);
    second.parameter_overrides.insert("DEPTH".into(), "64".into());

    let graph = ModuleGraph::build(&modules, &[first, second]);
    let overrides = &graph.module("fifo").unwrap().parameter_overrides;

    assert_eq!(overrides["DEPTH"], "64");
    assert_eq!(overrides["WIDTH"], "8");
}

#[test]
fn test_positional_overrides_follow_parameter_order() {
    let mut fifo = module("fifo", "fifo.v", (1, 8), vec![]);
    fifo.parameters = vec![Parameter::new("WIDTH", "8"), Parameter::new("DEPTH", "4")];
    let modules = vec![module("top", "top.v", (1, 20), vec![]), fifo];

    let mut u_a = instance("u_a", "fifo", "top.v", 3, vec![]);
    u_a.parameter_overrides.insert("#0".into(), "16".into());
    u_a.parameter_overrides.insert("#1".into(), "32".into());
    let mut u_b = instance("u_b", "fifo", "top.v", 4, vec![]);
    u_b.parameter_overrides.insert("#2".into(), "1".into());

    let graph = ModuleGraph::build(&modules, &[u_a, u_b]);
    let fifo = graph.module("fifo").unwrap();
    assert_eq!(fifo.parameter_overrides["WIDTH"], "16");
    assert_eq!(fifo.parameter_overrides["DEPTH"], "32");
    assert!(!fifo.parameter_overrides.contains_key("#0"));

    let top = graph.module("top").unwrap();
    assert_eq!(top.instances[0].parameter_overrides["WIDTH"], "16");
    assert!(top.instances[1].parameter_overrides.is_empty());
    assert!(graph.diagnostics().iter().any(|d| matches!(
        d,
        GraphDiagnostic::ExtraPositionalOverride { instance, position: 2, .. } if instance == "u_b"
    )));
}

#[test]
fn test_signal_impact() {
    let modules = vec![
        module("top", "top.v", (1, 30), vec![]),
        module("cpu", "cpu.v", (1, 10), vec![port("cpu_data_out", PortDirection::Output)]),
        module("cache", "cache.v", (1, 10), vec![port("cpu_data_in", PortDirection::Input)]),
    ];
    let instances = vec![
        instance("u_cpu", "cpu", "top.v", 5, vec![Connection::named("cpu_data_out", "data_out")]),
        instance("u_cache", "cache", "top.v", 8, vec![Connection::named("cpu_data_in", "data_out")]),
    ];
    let graph = ModuleGraph::build(&modules, &instances);
    let impact = graph.signal_impact("data_out");

    assert!(impact
        .sources
        .iter()
        .any(|s| s.instance.as_deref() == Some("u_cpu") && s.port == "cpu_data_out"));
    assert!(impact
        .sinks
        .iter()
        .any(|s| s.instance.as_deref() == Some("u_cache") && s.port == "cpu_data_in"));
    assert!(impact.affected_modules.contains(&"cpu".to_string()));
    assert!(impact.affected_modules.contains(&"cache".to_string()));

    assert!(graph.signal_impact("nope").sources.is_empty());
}

#[test]
fn test_find_module_path() {
    let graph = three_level();

    assert_eq!(
        graph.find_module_path("top", "alu"),
        Some(vec!["top".to_string(), "cpu".to_string(), "alu".to_string()])
    );
    assert_eq!(graph.find_module_path("alu", "top"), None);
    assert_eq!(graph.find_module_path("mem", "mem"), Some(vec!["mem".to_string()]));
    assert_eq!(graph.find_module_path("top", "ghost"), None);
}

#[test]
fn test_critical_path() {
    let graph = three_level();
    insta::assert_snapshot!(graph.critical_path().join(" -> "), @"top -> cpu -> alu");
}

#[test]
fn test_module_complexity() {
    let (modules, instances) = alu_system();
    let graph = ModuleGraph::build(&modules, &instances);

    let cpu = graph.module_complexity("cpu_core").unwrap();
    assert_eq!(cpu.instance_count, 1);
    assert_eq!(cpu.port_count, 1);
    assert_eq!(cpu.outbound_connections, 1);
    assert_eq!(cpu.inbound_connections, 0);
    assert_eq!(cpu.connection_count, 1);
    assert_eq!(cpu.hierarchy_depth, 1);

    assert_eq!(graph.module_complexity("alu").unwrap().hierarchy_depth, 0);
    assert!(graph.module_complexity("missing").is_none());
}

#[test]
fn test_cycles_terminate() {
    let modules = vec![
        module("t", "t.v", (1, 5), vec![]),
        module("a", "a.v", (1, 5), vec![]),
        module("b", "b.v", (1, 5), vec![]),
    ];
    let instances = vec![
        instance("u_a", "a", "t.v", 2, vec![]),
        instance("u_b", "b", "a.v", 2, vec![]),
        instance("u_a2", "a", "b.v", 2, vec![]),
    ];
    let graph = ModuleGraph::build(&modules, &instances);

    assert_eq!(graph.critical_path(), vec!["t", "a", "b"]);
    assert_eq!(graph.module_complexity("a").unwrap().hierarchy_depth, 1);
    assert_eq!(graph.module_complexity("t").unwrap().hierarchy_depth, 2);
    assert_eq!(graph.hierarchy().len(), 1);

    // Pure cycle: nothing is top-level.
    let cyclic = ModuleGraph::build(&modules[1..], &instances[1..]);
    assert!(cyclic.top_level_modules().is_empty());
    assert!(cyclic.critical_path().is_empty());
    assert_eq!(cyclic.module_complexity("b").unwrap().hierarchy_depth, 1);
}

#[test]
fn test_hierarchy_tree() {
    let graph = three_level();
    let tree = graph.hierarchy();

    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].module, "top");
    assert_eq!(tree[0].instance, None);
    let children: Vec<_> = tree[0].children.iter().map(|c| c.instance.clone().unwrap()).collect();
    assert_eq!(children, vec!["u_cpu", "u_mem"]);
    assert_eq!(tree[0].children[0].children[0].module, "alu");
}

#[test]
fn test_rebuild_resets_state() {
    let (modules, instances) = alu_system();
    let mut graph = ModuleGraph::build(&modules, &instances);
    graph.rebuild(&modules[..1], &[]);

    assert_eq!(graph.module_names(), vec!["alu"]);
    assert_eq!(graph.edge_count(), 0);
    assert!(graph.signal_flows().is_empty());
}

// ── Snapshots ───────────────────────────────────────────

#[test]
fn test_snapshot_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let (modules, instances) = alu_system();
    let mut table = SymbolTable::new(root);
    table.replace_file(
        Path::new("a.v"),
        FileExtraction {
            symbols: vec![extracted("alu", SymbolKind::Module, 1)],
            modules: modules[..1].to_vec(),
            instances: vec![],
        },
        Some(7),
    );
    table.replace_file(
        Path::new("b.v"),
        FileExtraction {
            symbols: vec![
                extracted("cpu_core", SymbolKind::Module, 1),
                extracted("u_alu", SymbolKind::Instance, 5),
            ],
            modules: modules[1..].to_vec(),
            instances: instances.clone(),
        },
        Some(9),
    );
    let graph = ModuleGraph::build(&table.modules(), &table.instances());

    assert!(load_snapshot(root).unwrap().is_none());
    save_snapshot(root, &table, &graph).unwrap();
    assert!(root.join(CACHE_DIR).join("meta.json").exists());

    let snapshot = load_snapshot(root).unwrap().unwrap();
    assert_eq!(snapshot.format_version, SNAPSHOT_VERSION);
    assert_eq!(snapshot.symbols.list_symbols(), table.list_symbols());
    assert_eq!(snapshot.symbols.content_hash(Path::new("b.v")), Some(9));
    assert_eq!(snapshot.symbols.find_by_name("u_alu").len(), 1);
    assert_eq!(snapshot.graph.forward_edges(), graph.forward_edges());
    assert_eq!(snapshot.graph.signal_flows(), graph.signal_flows());
    assert_eq!(snapshot.graph.module("cpu_core"), graph.module("cpu_core"));
    assert_eq!(snapshot.graph.top_level_modules(), vec!["cpu_core"]);
}

#[test]
fn test_older_snapshot_layout_reports_version() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    ensure_cache_dir(root).unwrap();
    // Version 1 stored parameters as a map; only the leading version is readable now.
    let old = bincode::serialize(&(1u32, vec!["alu".to_string()], 3u64)).unwrap();
    std::fs::write(snapshot_path(root), old).unwrap();

    match load_snapshot(root) {
        Err(TrellisError::SnapshotVersion { found, expected }) => {
            assert_eq!(found, 1);
            assert_eq!(expected, SNAPSHOT_VERSION);
        }
        other => panic!("expected a version error, got {other:?}"),
    }
}

#[test]
fn test_clear_cache_keeps_config() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    save_snapshot(root, &SymbolTable::new(root), &ModuleGraph::new()).unwrap();
    std::fs::write(root.join(CACHE_DIR).join(CONFIG_FILE), "[search]\n").unwrap();

    clear_cache(root).unwrap();

    assert!(!snapshot_path(root).exists());
    assert!(root.join(CACHE_DIR).join(CONFIG_FILE).exists());
    assert!(load_snapshot(root).unwrap().is_none());
}
