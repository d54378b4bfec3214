use std::path::PathBuf;

use ps_engine::RunSpec;
use ps_search::{Execution, ResultLog, WalkMode};
use ps_types::RecordValue;
use tempfile::tempdir;

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name)
}

#[test]
fn supernova_demo_loads() {
    let spec = RunSpec::from_path(demo("supernova_window.json")).unwrap();
    assert_eq!(
        spec.initial_point().keys().collect::<Vec<_>>(),
        vec!["t_exp", "v_start", "t_inner"]
    );
}

#[test]
fn supernova_demo_extrema_in_parallel() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("extrema.jsonl");
    let spec = RunSpec::from_path(demo("supernova_window.json")).unwrap();

    let summary = spec
        .run(&output, WalkMode::Extrema, Execution::Parallel)
        .unwrap();
    let records = ResultLog::read_records(&output).unwrap();

    // 18 epochs (4..=21 days) times 19 velocities (4000..=22000 km/s).
    assert_eq!(records.len(), 18 * 19);
    assert_eq!(summary.records, records.len());
    assert!(records
        .iter()
        .all(|r| matches!(r.get("t_inner"), Some(RecordValue::Bounds(_)))));
}
