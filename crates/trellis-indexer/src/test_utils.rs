//! Test utilities for Trellis

use std::fs;
use tempfile::TempDir;

pub const ALU_V: &str = r#"// Simple ALU
module alu #(parameter WIDTH = 8) (
    input  wire [WIDTH-1:0] a,
    input  wire [WIDTH-1:0] b,
    output reg  [WIDTH-1:0] result
);
    always @(*) begin
        result = a + b;
    end
endmodule
"#;

pub const CPU_CORE_V: &str = r#"module cpu_core (
    input  wire       clk,
    input  wire [7:0] data_in,
    output wire [7:0] cpu_data_out
);
    wire [7:0] alu_result;

    alu #(.WIDTH(8)) u_alu (
        .a(data_in),
        .b(8'h01),
        .result(alu_result)
    );

    assign cpu_data_out = alu_result;
endmodule
"#;

/// Non-ANSI header, body port declarations and positional connections.
pub const CACHE_V: &str = r#"module cache (clk, cpu_data_in, hit);
    input clk;
    input [7:0] cpu_data_in;
    output hit;
    reg hit;
endmodule
"#;

pub const SOC_SV: &str = r#"/* System top */
`timescale 1ns/1ps
module soc_top (input logic clk);
    logic [7:0] data_out;
    wire hit;

    cpu_core u_cpu (
        .clk(clk),
        .data_in(8'h00),
        .cpu_data_out(data_out)
    );

    cache u_cache (clk, data_out, hit);
endmodule
"#;

/// Create a repository with a specific file structure
pub fn create_repo_with_structure(structure: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    for (path, content) in structure {
        let full_path = root.join(path);

        // Create parent directories if needed
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }

        fs::write(&full_path, content).unwrap();
    }

    temp_dir
}

/// The two-file ALU / CPU core system.
pub fn create_cpu_repo() -> TempDir {
    create_repo_with_structure(&[("rtl/alu.v", ALU_V), ("rtl/cpu_core.v", CPU_CORE_V)])
}

/// A small SoC: soc_top -> cpu_core -> alu, soc_top -> cache.
pub fn create_soc_repo() -> TempDir {
    create_repo_with_structure(&[
        ("rtl/alu.v", ALU_V),
        ("rtl/cpu_core.v", CPU_CORE_V),
        ("rtl/cache.v", CACHE_V),
        ("rtl/soc_top.sv", SOC_SV),
        ("docs/notes.md", "soc notes"),
    ])
}
