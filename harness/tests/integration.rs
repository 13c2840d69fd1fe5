//! Integration tests: provisioning, timing, acceleration and full runs against
//! real SQLite databases.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use bench_core::{ConnectionConfig, Session};
use index_bench::dataset::{expected_price_sum, Row, MAX_ROW_COUNT};
use index_bench::dialect::{Dialect, SqliteDialect};
use index_bench::error::ProvisionStep;
use index_bench::{
    AccelerationError, BenchError, BenchSettings, Harness, ProvisioningError, QueryError,
    ReapplyPolicy, RunEvent, Stage,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::rstest;
use rusqlite::ErrorCode;

fn settings(row_count: u64) -> BenchSettings {
    BenchSettings {
        table: "bench_rows".to_string(),
        row_count,
        reapply_policy: ReapplyPolicy::Reject,
    }
}

fn session() -> Session {
    Session::open_in_memory().expect("open in-memory session")
}

/// SQLite statements with selected pieces swapped for SQL the store rejects
/// or that answers wrongly.
#[derive(Default)]
struct FaultyDialect {
    bad_create: bool,
    bad_sum: bool,
    bad_acceleration: bool,
    miscount: bool,
}

impl Dialect for FaultyDialect {
    fn name(&self) -> &'static str {
        "faulty-sqlite"
    }

    fn drop_dataset(&self, table: &str) -> String {
        SqliteDialect.drop_dataset(table)
    }

    fn create_dataset(&self, table: &str) -> String {
        if self.bad_create {
            format!("CREATE TABLE \"{table}\" (")
        } else {
            SqliteDialect.create_dataset(table)
        }
    }

    fn populate_dataset(&self, table: &str, row_count: u64) -> String {
        SqliteDialect.populate_dataset(table, row_count)
    }

    fn sum_price(&self, table: &str) -> String {
        if self.bad_sum {
            format!("SELECT SUM(no_such_column) FROM \"{table}\"")
        } else {
            SqliteDialect.sum_price(table)
        }
    }

    fn create_acceleration(&self, table: &str, if_missing: bool) -> String {
        if self.bad_acceleration {
            "CREATE INDEX broken_idx ON no_such_table (price);".to_string()
        } else {
            SqliteDialect.create_acceleration(table, if_missing)
        }
    }

    fn acceleration_exists(&self, table: &str) -> String {
        SqliteDialect.acceleration_exists(table)
    }

    fn count_rows(&self, table: &str) -> String {
        if self.miscount {
            format!("SELECT COUNT(*) + 1 FROM \"{table}\"")
        } else {
            SqliteDialect.count_rows(table)
        }
    }

    fn select_rows(&self, table: &str) -> String {
        SqliteDialect.select_rows(table)
    }
}

// ── Provisioning ────────────────────────────────────────────────────

#[rstest]
#[case(0)]
#[case(1)]
#[case(1_000)]
#[case(25_000)]
fn provision_yields_exact_row_count(#[case] row_count: u64) {
    let mut session = session();
    let mut harness = Harness::new(&mut session, &SqliteDialect, settings(row_count));

    let dataset = harness.provision_dataset(row_count).unwrap();
    assert_eq!(dataset.name(), "bench_rows");
    assert_eq!(dataset.row_count(), row_count);

    drop(harness);
    assert_eq!(dataset.count_rows(session.connection(), &SqliteDialect).unwrap(), row_count);
}

#[test]
fn provision_above_ceiling_fails_without_touching_store() {
    let mut session = session();
    session
        .connection()
        .execute_batch("CREATE TABLE bench_rows (x INTEGER); INSERT INTO bench_rows VALUES (1);")
        .unwrap();

    let mut harness = Harness::new(&mut session, &SqliteDialect, settings(1));
    let err = harness.provision_dataset(MAX_ROW_COUNT + 1).unwrap_err();
    assert!(matches!(
        err,
        ProvisioningError::ExceedsCeiling {
            requested,
            ceiling: MAX_ROW_COUNT
        } if requested == MAX_ROW_COUNT + 1
    ));

    // The old table is still there.
    drop(harness);
    let x: i64 = session
        .connection()
        .query_row("SELECT x FROM bench_rows", [], |r| r.get(0))
        .unwrap();
    assert_eq!(x, 1);
}

#[test]
fn generated_rows_match_the_formula() {
    let row_count = 50_000;
    let mut session = session();
    let dataset = Harness::new(&mut session, &SqliteDialect, settings(row_count))
        .provision_dataset(row_count)
        .unwrap();
    let conn = session.connection();

    let head = dataset.load_rows(conn, &SqliteDialect, 1, 20).unwrap();
    let expected: Vec<Row> = (1..=20).map(Row::from_key).collect();
    assert_eq!(head, expected);

    let mut rng = StdRng::seed_from_u64(0x5EED);
    for _ in 0..200 {
        let key = rng.gen_range(1..=row_count);
        let stored = dataset.load_rows(conn, &SqliteDialect, key, key).unwrap();
        assert_eq!(stored, vec![Row::from_key(key)], "row {key}");
    }

    let tail = dataset.load_rows(conn, &SqliteDialect, row_count, row_count + 10).unwrap();
    assert_eq!(tail, vec![Row::from_key(row_count)]);
}

#[test]
fn reprovisioning_is_idempotent_and_deterministic() {
    let row_count = 3_000;
    let mut session = session();

    let first = {
        let mut harness = Harness::new(&mut session, &SqliteDialect, settings(row_count));
        harness.provision_dataset(row_count).unwrap()
    };
    let before = first
        .load_rows(session.connection(), &SqliteDialect, 1, row_count)
        .unwrap();

    let second = {
        let mut harness = Harness::new(&mut session, &SqliteDialect, settings(row_count));
        harness.provision_dataset(row_count).unwrap()
    };
    let after = second
        .load_rows(session.connection(), &SqliteDialect, 1, row_count)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(after.len() as u64, row_count);
    assert_eq!(before, after);
}

#[test]
fn reprovisioning_drops_a_previous_acceleration_index() {
    let mut session = session();
    let mut harness = Harness::new(&mut session, &SqliteDialect, settings(100));

    let dataset = harness.provision_dataset(100).unwrap();
    harness.apply_acceleration(&dataset).unwrap();

    let dataset = harness.provision_dataset(100).unwrap();
    harness.apply_acceleration(&dataset).unwrap();
}

#[test]
fn provisioning_rejection_reports_the_step() {
    let dialect = FaultyDialect {
        bad_create: true,
        ..Default::default()
    };
    let mut session = session();
    let mut harness = Harness::new(&mut session, &dialect, settings(10));

    let err = harness.provision_dataset(10).unwrap_err();
    assert!(matches!(
        err,
        ProvisioningError::Rejected {
            step: ProvisionStep::Create,
            ..
        }
    ));
}

#[test]
fn provisioning_checks_the_count_through_the_dialect() {
    let dialect = FaultyDialect {
        miscount: true,
        ..Default::default()
    };
    let mut session = session();
    let mut harness = Harness::new(&mut session, &dialect, settings(10));

    let err = harness.provision_dataset(10).unwrap_err();
    assert!(matches!(
        err,
        ProvisioningError::RowCountMismatch {
            expected: 10,
            actual: 11,
            ..
        }
    ));
}

#[test]
fn provisioning_persists_in_a_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConnectionConfig {
        database: dir.path().join("bench.db").to_string_lossy().into_owned(),
        create_if_missing: true,
    };

    {
        let mut session = Session::open(&config).unwrap();
        Harness::new(&mut session, &SqliteDialect, settings(500))
            .provision_dataset(500)
            .unwrap();
    }

    let reopened = Session::open(&config).unwrap();
    let count: i64 = reopened
        .connection()
        .query_row("SELECT COUNT(*) FROM bench_rows", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 500);
}

// ── Timing ──────────────────────────────────────────────────────────

#[test]
fn empty_dataset_sums_to_zero() {
    let mut session = session();
    let mut harness = Harness::new(&mut session, &SqliteDialect, settings(0));

    let dataset = harness.provision_dataset(0).unwrap();
    let sample = harness.time_query(&dataset).unwrap();
    assert_eq!(sample.sum, 0);
    assert!(sample.elapsed_ms() >= 0.0);
    Harness::verify_sum(&dataset, &sample).unwrap();
}

#[test]
fn repeated_queries_each_execute() {
    let mut session = session();
    let mut harness = Harness::new(&mut session, &SqliteDialect, settings(2_000));

    let dataset = harness.provision_dataset(2_000).unwrap();
    let a = harness.time_query(&dataset).unwrap();
    let b = harness.time_query(&dataset).unwrap();
    assert_eq!(a.sum, expected_price_sum(2_000));
    assert_eq!(a.sum, b.sum);
    assert!(a.elapsed > Duration::ZERO);
    assert!(b.elapsed > Duration::ZERO);
}

#[test]
fn failed_query_is_an_error_not_a_zero_sample() {
    let dialect = FaultyDialect {
        bad_sum: true,
        ..Default::default()
    };
    let mut session = session();
    let mut harness = Harness::new(&mut session, &dialect, settings(10));

    let dataset = harness.provision_dataset(10).unwrap();
    let err = harness.time_query(&dataset).unwrap_err();
    assert!(matches!(err, QueryError::Rejected { .. }));
}

#[test]
fn query_on_missing_table_fails() {
    let mut session = session();
    let mut harness = Harness::new(&mut session, &SqliteDialect, settings(10));
    let ghost = index_bench::Dataset::new("never_created", 10);
    assert!(harness.time_query(&ghost).is_err());
}

// ── Acceleration ────────────────────────────────────────────────────

#[test]
fn second_acceleration_is_rejected_by_default() {
    let mut session = session();
    let mut harness = Harness::new(&mut session, &SqliteDialect, settings(100));

    let dataset = harness.provision_dataset(100).unwrap();
    harness.apply_acceleration(&dataset).unwrap();

    let err = harness.apply_acceleration(&dataset).unwrap_err();
    assert!(matches!(err, AccelerationError::AlreadyApplied { ref table } if table == "bench_rows"));
}

#[test]
fn second_acceleration_is_a_noop_when_tolerated() {
    let mut session = session();
    let mut settings = settings(100);
    settings.reapply_policy = ReapplyPolicy::Tolerate;
    let mut harness = Harness::new(&mut session, &SqliteDialect, settings);

    let dataset = harness.provision_dataset(100).unwrap();
    harness.apply_acceleration(&dataset).unwrap();
    harness.apply_acceleration(&dataset).unwrap();

    drop(harness);
    let indexes: i64 = session
        .connection()
        .query_row(&SqliteDialect.acceleration_exists("bench_rows"), [], |r| {
            r.get(0)
        })
        .unwrap();
    assert_eq!(indexes, 1);
}

#[test]
fn accelerated_query_uses_the_covering_index() {
    let mut session = session();
    let dataset = {
        let mut harness = Harness::new(&mut session, &SqliteDialect, settings(1_000));
        let dataset = harness.provision_dataset(1_000).unwrap();
        harness.apply_acceleration(&dataset).unwrap();
        dataset
    };

    let explain = SqliteDialect
        .explain(&SqliteDialect.sum_price(dataset.name()))
        .unwrap();
    let conn = session.connection();
    let mut stmt = conn.prepare(&explain).unwrap();
    let plan: Vec<String> = stmt
        .query_map([], |r| r.get(3))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let plan = plan.join(" ");
    assert!(plan.contains("bench_rows_price_accel"), "plan: {plan}");
}

#[test]
fn acceleration_rejected_by_store() {
    let dialect = FaultyDialect {
        bad_acceleration: true,
        ..Default::default()
    };
    let mut session = session();
    let mut harness = Harness::new(&mut session, &dialect, settings(10));

    let dataset = harness.provision_dataset(10).unwrap();
    let err = harness.apply_acceleration(&dataset).unwrap_err();
    assert!(matches!(err, AccelerationError::Rejected { .. }));
}

// ── Full runs ───────────────────────────────────────────────────────

fn describe(event: &RunEvent<'_>) -> String {
    match event {
        RunEvent::Started(stage) => format!("start {stage}"),
        RunEvent::Provisioned(d) => format!("provisioned {}", d.row_count()),
        RunEvent::Timed(stage, _) => format!("timed {stage}"),
        RunEvent::Accelerated(_) => "accelerated".to_string(),
        RunEvent::Failed(stage, _) => format!("failed {stage}"),
    }
}

#[test]
fn end_to_end_run_reports_three_numbers() {
    let mut session = session();
    let mut events = Vec::new();

    let result = Harness::new(&mut session, &SqliteDialect, settings(1_000))
        .run(&mut |e: &RunEvent<'_>| events.push(describe(e)))
        .unwrap();

    assert_eq!(
        events,
        vec![
            "start provision",
            "provisioned 1000",
            "start query without index",
            "timed query without index",
            "start accelerate",
            "accelerated",
            "start query with index",
            "timed query with index",
        ]
    );

    let expected = expected_price_sum(1_000);
    assert_eq!(result.without_index.sum, expected);
    assert_eq!(result.with_index.sum, expected);
    assert!(result.without_index.elapsed_ms().is_finite());
    assert!(result.with_index.elapsed_ms().is_finite());
    let ratio = result.ratio().expect("accelerated query should take measurable time");
    assert!(ratio.is_finite() && ratio > 0.0);
}

#[test]
fn failing_stage_stops_the_run() {
    let dialect = FaultyDialect {
        bad_acceleration: true,
        ..Default::default()
    };
    let mut session = session();
    let mut events = Vec::new();

    let err = Harness::new(&mut session, &dialect, settings(200))
        .run(&mut |e: &RunEvent<'_>| events.push(describe(e)))
        .unwrap_err();

    assert!(matches!(err, BenchError::Acceleration(_)));
    assert_eq!(events.last().map(String::as_str), Some("failed accelerate"));
    assert!(!events.iter().any(|e| e.contains("query with index")));
}

#[test]
fn rerunning_on_the_same_database_starts_fresh() {
    // A second run on the same database starts over from a fresh table, so
    // the default reject policy never sees the previous run's index.
    let mut session = session();
    for _ in 0..2 {
        Harness::new(&mut session, &SqliteDialect, settings(300))
            .run(&mut index_bench::harness::Silent)
            .unwrap();
    }
}

#[test]
fn run_stops_at_provisioning_on_a_read_only_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ro.db");
    drop(
        Session::open(&ConnectionConfig {
            database: path.to_string_lossy().into_owned(),
            create_if_missing: true,
        })
        .unwrap(),
    );

    let uri = format!("file:{}?mode=ro", path.display());
    let mut session = match Session::open(&ConnectionConfig {
        database: uri,
        create_if_missing: false,
    }) {
        Ok(session) => session,
        // Some builds refuse WAL setup on a read-only handle; that is a
        // connection failure, which is also an acceptable outcome here.
        Err(_) => return,
    };

    let mut stages = Vec::new();
    let err = Harness::new(&mut session, &SqliteDialect, settings(10))
        .run(&mut |e: &RunEvent<'_>| {
            if let RunEvent::Failed(stage, _) = e {
                stages.push(*stage);
            }
        })
        .unwrap_err();

    assert!(matches!(err, BenchError::Provisioning(_)));
    assert_eq!(stages, vec![Stage::Provision]);
}

#[test]
fn interrupt_cancels_provisioning_and_leaves_the_session_usable() {
    let mut session = session();
    let handle = session.interrupt_handle();
    let done = AtomicBool::new(false);
    let mut failed = Vec::new();

    // An interrupt only hits a statement that is running, so keep firing
    // until the run returns.
    let err = thread::scope(|s| {
        let done = &done;
        s.spawn(move || {
            while !done.load(Ordering::Acquire) {
                handle.interrupt();
                thread::sleep(Duration::from_millis(5));
            }
        });
        let outcome = Harness::new(&mut session, &SqliteDialect, settings(10_000_000))
            .run(&mut |e: &RunEvent<'_>| {
                if let RunEvent::Failed(stage, _) = e {
                    failed.push(*stage);
                }
            });
        done.store(true, Ordering::Release);
        outcome
    })
    .unwrap_err();

    let source = match err {
        BenchError::Provisioning(ProvisioningError::Rejected { source, .. }) => source,
        other => panic!("expected a rejected provisioning, got {other:?}"),
    };
    assert_eq!(source.sqlite_error_code(), Some(ErrorCode::OperationInterrupted));
    assert_eq!(failed, vec![Stage::Provision]);

    let one: i64 = session
        .connection()
        .query_row("SELECT 1", [], |r| r.get(0))
        .unwrap();
    assert_eq!(one, 1);
}
