//! Source registration against real files.

use fvm_core::{Config, FvmError, PslFlavor, SourceKind, StepCatalog, StepNames};
use std::fs;

fn catalog() -> StepCatalog {
    StepCatalog::new(vec![StepNames {
        name: "prove".to_string(),
        post_steps: vec![],
    }])
}

#[test]
fn test_glob_adds_are_sorted() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["c.vhd", "a.vhd", "b.vhd", "notes.txt"] {
        fs::write(dir.path().join(name), "-- hdl\n").unwrap();
    }

    let mut config = Config::new(catalog());
    let pattern = format!("{}/*.vhd", dir.path().display());
    let added = config.add_vhdl_sources(&pattern, "work").unwrap();
    assert_eq!(added, 3);

    let names: Vec<String> = config
        .sources_of(SourceKind::Vhdl)
        .map(|s| s.path.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["a.vhd", "b.vhd", "c.vhd"]);
}

#[test]
fn test_glob_matching_nothing_is_bad_value() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::new(catalog());
    let pattern = format!("{}/nope/*.vhd", dir.path().display());

    let err = config.add_vhdl_sources(&pattern, "work").unwrap_err();
    assert!(matches!(err, FvmError::NoFilesFound { .. }));
    assert_eq!(err.exit_code(), 3);
    assert!(err.to_string().contains("no files found for pattern"));
    assert!(config.sources().is_empty());
}

#[test]
fn test_unusual_extension_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let odd = dir.path().join("counter.txt");
    fs::write(&odd, "entity counter is end;\n").unwrap();

    let mut config = Config::new(catalog());
    config.add_vhdl_source(&odd, "work").unwrap();
    assert_eq!(config.sources().len(), 1);
}

#[test]
fn test_libraries_in_first_use_order() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["pkg.vhd", "core.v", "top.vhd"] {
        fs::write(dir.path().join(name), "\n").unwrap();
    }
    let mut config = Config::new(catalog());
    config.add_vhdl_source(dir.path().join("pkg.vhd"), "common").unwrap();
    config.add_verilog_source(dir.path().join("core.v"), "work").unwrap();
    config.add_vhdl_source(dir.path().join("top.vhd"), "common").unwrap();
    assert_eq!(config.libraries(), vec!["common", "work"]);
}

#[test]
fn test_psl_flavor_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let psl = dir.path().join("counter.psl");
    fs::write(&psl, "vunit v (counter) {}\n").unwrap();

    let mut config = Config::new(catalog());
    config.add_psl_source(&psl, Some(PslFlavor::Vhdl)).unwrap();
    let src = config.sources_of(SourceKind::Psl).next().unwrap();
    assert_eq!(src.psl_flavor, Some(PslFlavor::Vhdl));
    assert!(config.libraries().is_empty());
}
