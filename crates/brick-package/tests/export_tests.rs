mod common;

use brick_package::*;
use common::*;
use pretty_assertions::assert_eq;
use std::fs;

fn adder_workspace(sandbox: &Sandbox) -> (std::path::PathBuf, std::path::PathBuf) {
    let mux = sandbox.block(&BlockSpec {
        files: &[("mux.vhd", MUX_VHD)],
        ..BlockSpec::new("logic", "mux")
    });
    let adder = sandbox.block(&BlockSpec {
        files: &[
            ("rtl/adder.vhd", ADDER_VHD),
            ("sim/adder_tb.vhd", ADDER_TB_VHD),
        ],
        ..BlockSpec::new("arith", "adder")
    });
    (adder, mux)
}

#[test]
fn test_export_detects_top_and_bench() {
    let sandbox = Sandbox::new();
    let (adder, mux) = adder_workspace(&sandbox);
    let ws = sandbox.load();

    let recipe = ws.export(&downloaded("arith", "adder"), None).unwrap();
    assert_eq!(recipe.top.as_deref(), Some("adder"));
    assert_eq!(recipe.bench.as_deref(), Some("adder_tb"));
    assert_eq!(
        recipe.lines,
        vec![
            format!("@LIB logic {}", mux.join("mux.vhd").display()),
            format!("@SRC {}", adder.join("rtl/adder.vhd").display()),
            format!("@SIM {}", adder.join("sim/adder_tb.vhd").display()),
            "@SIM-TOP adder_tb".to_string(),
            "@SRC-TOP adder".to_string(),
        ]
    );
    assert_eq!(recipe.order, vec!["logic.mux", "arith.adder", "arith.adder_tb"]);
    assert_eq!(recipe.block_order, vec!["logic.mux", "arith.adder"]);
    assert_eq!(recipe.path, adder.join("build/recipe"));
    assert_eq!(
        fs::read_to_string(&recipe.path).unwrap(),
        recipe.lines.join("\n") + "\n"
    );
    assert_eq!(
        recipe.tree,
        "--- DEPENDENCY TREE ---\n\\- arith.adder_tb\n   \\- arith.adder\n      \\- logic.mux\n"
    );
}

#[test]
fn test_export_with_explicit_top() {
    let sandbox = Sandbox::new();
    adder_workspace(&sandbox);
    let ws = sandbox.load();

    let recipe = ws.export(&downloaded("arith", "adder"), Some("ADDER_TB")).unwrap();
    assert_eq!(recipe.top, None);
    assert_eq!(recipe.bench.as_deref(), Some("adder_tb"));
    assert_eq!(recipe.lines.last().map(String::as_str), Some("@SIM-TOP adder_tb"));

    let err = ws
        .export(&downloaded("arith", "adder"), Some("ghost"))
        .unwrap_err();
    assert!(matches!(err, PackageError::UnitNotFound { .. }));
}

#[test]
fn test_export_prefers_installed_dependency() {
    let sandbox = Sandbox::new();
    let (_, mux) = adder_workspace(&sandbox);
    sandbox.release_as(&mux, "1.0.0");
    let mut ws = sandbox.load();
    ws.install(&downloaded("logic", "mux")).unwrap();

    let recipe = ws.export(&downloaded("arith", "adder"), Some("adder")).unwrap();
    let cached = ws.cache.latest_path(&key("logic", "mux")).join("mux.vhd");
    assert_eq!(recipe.lines[0], format!("@LIB logic {}", cached.display()));
}

#[test]
fn test_export_without_units_fails() {
    let sandbox = Sandbox::new();
    sandbox.block(&BlockSpec::new("arith", "empty"));
    let ws = sandbox.load();

    let err = ws.export(&downloaded("arith", "empty"), None).unwrap_err();
    assert!(matches!(err, PackageError::Graph(GraphError::NoBuildUnit)));
}

#[test]
fn test_update_requires_records_usage() {
    let sandbox = Sandbox::new();
    let (adder, _) = adder_workspace(&sandbox);
    let mut ws = sandbox.load();

    let dry = ws.update_requires(&downloaded("arith", "adder"), true).unwrap();
    assert_eq!(dry.len(), 1);
    assert!(BlockMetadata::load(&adder).unwrap().requires().is_empty());

    let saved = ws.update_requires(&downloaded("arith", "adder"), false).unwrap();
    assert_eq!(saved, dry);
    assert_eq!(
        BlockMetadata::load(&adder).unwrap().requires(),
        &[Requirement::new(
            Identifier::new("", "logic", "mux"),
            Version::ZERO,
            vec![UsageCode::Unstable]
        )]
    );
}
