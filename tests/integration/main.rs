//! Integration tests for Trellis
//!
//! These tests drive the indexer, graph, search and watcher crates together
//! through their public APIs.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::RwLock;
use trellis_core::{PortDirection, SignalEndpoint, SymbolKind};
use trellis_indexer::{RepositoryIndex, get_extractor};
use trellis_search::SearchMode;
use trellis_watcher::WatcherService;

const ALU_V: &str = "module alu (
    input  wire [7:0] a,
    input  wire [7:0] b,
    output wire [7:0] result
);
    assign result = a + b;
endmodule
";

const CPU_CORE_V: &str = "module cpu_core (
    input  wire [7:0] data_in,
    output wire [7:0] data_out
);
    wire [7:0] alu_result;

    alu u_alu (
        .a(data_in),
        .b(data_in),
        .result(alu_result)
    );

    assign data_out = alu_result;
endmodule
";

fn create_repo(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (path, content) in files {
        let full_path = temp_dir.path().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full_path, content).unwrap();
    }
    temp_dir
}

fn indexed(root: &Path) -> RepositoryIndex {
    let mut index = RepositoryIndex::open(root).unwrap();
    let report = index.build_index();
    assert!(report.errors.is_empty(), "unexpected errors: {:?}", report.errors);
    index
}

/// Two files, one instantiation: the smallest complete system
#[test]
fn test_end_to_end_two_file_system() {
    let repo = create_repo(&[("alu.v", ALU_V), ("cpu_core.v", CPU_CORE_V)]);
    let index = indexed(repo.path());
    let graph = index.graph();

    assert_eq!(graph.node_count(), 2);
    assert!(graph.contains("alu"));
    assert!(graph.contains("cpu_core"));
    assert_eq!(graph.children("cpu_core"), vec!["alu"]);
    assert_eq!(graph.parents("alu"), vec!["cpu_core"]);
    assert_eq!(graph.top_level_modules(), vec!["cpu_core"]);
    assert_eq!(graph.leaf_modules(), vec!["alu"]);

    let alu = graph.module("alu").unwrap();
    let ports: Vec<_> = alu.ports.iter().map(|p| (p.name.as_str(), p.direction)).collect();
    assert_eq!(
        ports,
        vec![
            ("a", PortDirection::Input),
            ("b", PortDirection::Input),
            ("result", PortDirection::Output),
        ]
    );

    let cpu = graph.module("cpu_core").unwrap();
    assert_eq!(cpu.instances.len(), 1);
    let result = cpu.instances[0]
        .connections
        .iter()
        .find(|c| c.port_name == "result")
        .unwrap();
    assert_eq!(result.signal_name, "alu_result");
}

#[test]
fn test_signal_flow_and_analysis() {
    let repo = create_repo(&[("alu.v", ALU_V), ("cpu_core.v", CPU_CORE_V)]);
    let index = indexed(repo.path());
    let graph = index.graph();

    let impact = graph.signal_impact("alu_result");
    assert_eq!(
        impact.sources,
        vec![SignalEndpoint {
            module: "alu".to_string(),
            instance: Some("u_alu".to_string()),
            port: "result".to_string(),
        }]
    );
    assert_eq!(impact.affected_modules, vec!["alu", "cpu_core"]);

    assert_eq!(graph.find_module_path("cpu_core", "alu").unwrap(), vec!["cpu_core", "alu"]);
    assert!(graph.find_module_path("alu", "cpu_core").is_none());
    assert_eq!(graph.critical_path(), vec!["cpu_core", "alu"]);

    let complexity = graph.module_complexity("cpu_core").unwrap();
    assert_eq!(complexity.instance_count, 1);
    assert_eq!(complexity.connection_count, 3);
    assert_eq!(complexity.inbound_connections, 2);
    assert_eq!(complexity.outbound_connections, 1);
    assert_eq!(complexity.hierarchy_depth, 1);
}

#[test]
fn test_search_across_index() {
    let repo = create_repo(&[("rtl/alu.v", ALU_V), ("rtl/cpu_core.v", CPU_CORE_V)]);
    let index = indexed(repo.path());

    let response = index.search("alu", Some(SearchMode::Symbol)).unwrap();
    assert!(!response.results.is_empty());
    assert_eq!(response.results[0].name.as_deref(), Some("alu"));

    let modules: Vec<_> = index
        .list_symbols()
        .into_iter()
        .filter(|s| s.kind == SymbolKind::Module)
        .map(|s| s.name)
        .collect();
    assert_eq!(modules, vec!["alu", "cpu_core"]);

    let in_file = index.get_symbols_in_file(Path::new("rtl/cpu_core.v"));
    assert!(in_file.iter().any(|s| s.name == "u_alu"));
}

#[test]
fn test_snapshot_survives_reopen() {
    let repo = create_repo(&[("alu.v", ALU_V), ("cpu_core.v", CPU_CORE_V)]);
    let index = indexed(repo.path());
    let symbols = index.list_symbols();
    index.close().unwrap();

    let restored = RepositoryIndex::load(repo.path()).unwrap().unwrap();
    assert_eq!(restored.list_symbols(), symbols);
    assert_eq!(restored.graph().top_level_modules(), vec!["cpu_core"]);

    trellis_core::clear_cache(repo.path()).unwrap();
    assert!(RepositoryIndex::load(repo.path()).unwrap().is_none());
}

#[test]
fn test_extractor_selection() {
    let test_cases = [
        ("alu.v", true),
        ("pkg.sv", true),
        ("defs.vh", true),
        ("types.svh", true),
        ("notes.txt", false),
        ("main.rs", false),
    ];

    for (filename, should_have_extractor) in test_cases {
        let extractor = get_extractor(Path::new(filename));
        assert_eq!(
            extractor.is_some(),
            should_have_extractor,
            "extractor presence for {filename}"
        );
    }
}

#[tokio::test]
async fn test_watcher_service_creation() {
    let repo = create_repo(&[("alu.v", ALU_V)]);
    let index = Arc::new(RwLock::new(indexed(repo.path())));

    let mut service = WatcherService::new(Arc::clone(&index)).await.unwrap();
    assert!(service.start_watching().is_ok());
    assert!(index.read().await.graph().contains("alu"));
}
