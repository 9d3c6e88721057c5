use std::path::PathBuf;

use valprof_harness::structured_log::{
    ArtifactIndex, LogEmitter, LogEntry, LogLevel, RunOutcome, sha256_hex, validate_log_line,
};
use valprof_harness::{StressConfig, memop_bucket_table, run_stress};

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("valprof-harness-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir.join(name)
}

#[test]
fn contended_run_keeps_every_site_within_cap() {
    let report = run_stress(&StressConfig {
        threads: 8,
        sites: 32,
        values: 200,
        iterations: 20_000,
        nodes: 256,
        max_per_site: 8,
        seed: 42,
    })
    .expect("valid config");

    assert!(report.passed(), "{:?}", report.violations);
    assert!(report.max_site_len <= 8);
    assert!(report.allocated <= report.arena_capacity);
    assert_eq!(report.issued, 8 * 20_000);
    assert_eq!(report.hits + report.stats.slow_path(), report.issued);
    assert_eq!(report.stats.inserts, report.allocated as u64);

    let json: serde_json::Value = serde_json::to_value(&report).expect("report serializes");
    assert_eq!(json["config"]["threads"], 8);
    assert!(json["violations"].as_array().is_some_and(Vec::is_empty));
}

#[test]
fn hot_values_survive_cold_noise() {
    let config = StressConfig {
        threads: 1,
        sites: 1,
        values: 10_000,
        iterations: 50_000,
        nodes: 64,
        max_per_site: 8,
        seed: 3,
    };
    let report = run_stress(&config).expect("valid config");
    assert!(report.passed(), "{:?}", report.violations);
    // Hot hits dominate, so most observations never reach the allocator.
    assert!(report.hits > report.issued / 2);
}

#[test]
fn run_log_and_index_validate() {
    let log_path = scratch("run.jsonl");
    let stats = run_stress(&StressConfig {
        threads: 1,
        iterations: 500,
        ..StressConfig::default()
    })
    .expect("valid config")
    .stats;
    {
        let mut emitter = LogEmitter::to_file(&log_path, "itest").expect("open log");
        emitter.emit(LogLevel::Info, "stress_start").expect("emit");
        emitter
            .emit_entry(
                LogEntry::new("", LogLevel::Info, "stress_done")
                    .with_outcome(RunOutcome::Pass)
                    .with_duration_ms(12)
                    .with_stats(stats),
            )
            .expect("emit");
        emitter.flush().expect("flush");
    }

    let text = std::fs::read_to_string(&log_path).expect("read log");
    let entries: Vec<_> = text
        .lines()
        .enumerate()
        .map(|(i, line)| validate_log_line(line, i + 1).expect("schema-valid line"))
        .collect();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.run_id.as_deref() == Some("itest")));
    assert_eq!(entries[1].stats, Some(stats));

    let mut index = ArtifactIndex::new("itest");
    index.add_file(&log_path, "log").expect("hash log");
    assert_eq!(index.artifacts.len(), 1);
    assert_eq!(index.artifacts[0].sha256, sha256_hex(text.as_bytes()));
    assert_eq!(index.artifacts[0].size_bytes, Some(text.len() as u64));
}

#[test]
fn bucket_table_matches_memop_boundaries() {
    let table = memop_bucket_table(600);
    let reps: Vec<u64> = table.iter().map(|r| r.rep).collect();
    assert_eq!(
        reps,
        vec![
            0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 16, 17, 32, 33, 64, 65, 128, 129, 256, 257, 512, 513
        ]
    );
}
