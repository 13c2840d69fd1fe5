//! The benchmark itself: provision, time, accelerate, time again.

use std::fmt;
use std::time::{Duration, Instant};

use bench_core::Session;

use crate::config::{BenchSettings, ReapplyPolicy};
use crate::dataset::{Dataset, MAX_ROW_COUNT};
use crate::dialect::Dialect;
use crate::error::{AccelerationError, BenchError, ProvisionStep, ProvisioningError, QueryError};

/// Stages of [`Harness::run`], in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Provision,
    QueryWithout,
    Accelerate,
    QueryWith,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Provision => "provision",
            Stage::QueryWithout => "query without index",
            Stage::Accelerate => "accelerate",
            Stage::QueryWith => "query with index",
        };
        f.write_str(name)
    }
}

/// One timed execution of the aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSample {
    pub elapsed: Duration,
    /// `SUM(price)`; an empty table reports 0.
    pub sum: i64,
}

impl TimingSample {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub dataset: Dataset,
    pub without_index: TimingSample,
    pub with_index: TimingSample,
}

impl BenchmarkResult {
    /// `without / with`, or `None` when the accelerated query took no
    /// measurable time.
    pub fn ratio(&self) -> Option<f64> {
        let with = self.with_index.elapsed.as_secs_f64();
        if with <= 0.0 {
            return None;
        }
        Some(self.without_index.elapsed.as_secs_f64() / with)
    }

    /// [`Self::ratio`] rounded to the nearest integer.
    pub fn speedup(&self) -> Option<u64> {
        self.ratio().map(|r| r.round() as u64)
    }
}

/// Progress notifications from [`Harness::run`].
#[derive(Debug)]
pub enum RunEvent<'a> {
    Started(Stage),
    Provisioned(&'a Dataset),
    Timed(Stage, &'a TimingSample),
    Accelerated(&'a Dataset),
    Failed(Stage, &'a BenchError),
}

pub trait RunObserver {
    fn on_event(&mut self, event: &RunEvent<'_>);
}

impl<F> RunObserver for F
where
    F: FnMut(&RunEvent<'_>),
{
    fn on_event(&mut self, event: &RunEvent<'_>) {
        self(event)
    }
}

/// Observer that ignores everything.
pub struct Silent;

impl RunObserver for Silent {
    fn on_event(&mut self, _event: &RunEvent<'_>) {}
}

/// Runs the benchmark over a borrowed session.
///
/// The session is owned by the caller so its lifetime (and release) spans the
/// whole run regardless of which stage fails.
pub struct Harness<'a> {
    session: &'a mut Session,
    dialect: &'a dyn Dialect,
    settings: BenchSettings,
}

impl<'a> Harness<'a> {
    pub fn new(session: &'a mut Session, dialect: &'a dyn Dialect, settings: BenchSettings) -> Self {
        Self {
            session,
            dialect,
            settings,
        }
    }

    /// Drop and rebuild the dataset table with exactly `row_count` rows.
    pub fn provision_dataset(&mut self, row_count: u64) -> Result<Dataset, ProvisioningError> {
        if row_count > MAX_ROW_COUNT {
            return Err(ProvisioningError::ExceedsCeiling {
                requested: row_count,
                ceiling: MAX_ROW_COUNT,
            });
        }

        let table = self.settings.table.clone();
        let rejected = |step: ProvisionStep| {
            let table = table.clone();
            move |source| ProvisioningError::Rejected {
                table,
                step,
                source,
            }
        };

        log::debug!("Provisioning '{table}' with {row_count} rows");
        let started = Instant::now();

        let tx = self
            .session
            .connection_mut()
            .transaction()
            .map_err(rejected(ProvisionStep::Begin))?;
        tx.execute_batch(&self.dialect.drop_dataset(&table))
            .map_err(rejected(ProvisionStep::Drop))?;
        tx.execute_batch(&self.dialect.create_dataset(&table))
            .map_err(rejected(ProvisionStep::Create))?;
        tx.execute_batch(&self.dialect.populate_dataset(&table, row_count))
            .map_err(rejected(ProvisionStep::Populate))?;
        tx.commit().map_err(rejected(ProvisionStep::Commit))?;

        let dataset = Dataset::new(table.clone(), row_count);
        let actual = dataset
            .count_rows(self.session.connection(), self.dialect)
            .map_err(rejected(ProvisionStep::Count))?;
        if actual != row_count {
            return Err(ProvisioningError::RowCountMismatch {
                table,
                expected: row_count,
                actual,
            });
        }

        log::debug!(
            "Provisioned '{}' in {:.1}s",
            dataset.name(),
            started.elapsed().as_secs_f64()
        );
        Ok(dataset)
    }

    /// Execute the aggregation once and time it.
    ///
    /// The clock covers statement preparation through reading the scalar.
    /// Statements are prepared fresh on every call.
    pub fn time_query(&mut self, dataset: &Dataset) -> Result<TimingSample, QueryError> {
        let sql = self.dialect.sum_price(dataset.name());
        self.log_query_plan(&sql);

        let rejected = |source| QueryError::Rejected {
            table: dataset.name().to_string(),
            source,
        };

        let conn = self.session.connection();
        let started = Instant::now();
        let mut stmt = conn.prepare(&sql).map_err(rejected)?;
        let sum: Option<i64> = stmt.query_row([], |row| row.get(0)).map_err(rejected)?;
        let elapsed = started.elapsed();

        let sample = TimingSample {
            elapsed,
            sum: sum.unwrap_or(0),
        };
        log::debug!(
            "SUM(price) over '{}' = {} in {:.3}ms",
            dataset.name(),
            sample.sum,
            sample.elapsed_ms()
        );
        Ok(sample)
    }

    /// Check a sample against the closed-form sum for the dataset.
    pub fn verify_sum(dataset: &Dataset, sample: &TimingSample) -> Result<(), QueryError> {
        let expected = dataset.expected_price_sum();
        if sample.sum != expected {
            return Err(QueryError::UnexpectedSum {
                table: dataset.name().to_string(),
                expected,
                actual: sample.sum,
            });
        }
        Ok(())
    }

    /// Build the acceleration index, honouring the configured
    /// [`ReapplyPolicy`] if it already exists.
    pub fn apply_acceleration(&mut self, dataset: &Dataset) -> Result<(), AccelerationError> {
        let table = dataset.name();
        let rejected = |source| AccelerationError::Rejected {
            table: table.to_string(),
            source,
        };

        let conn = self.session.connection();
        let existing: i64 = conn
            .query_row(&self.dialect.acceleration_exists(table), [], |r| r.get(0))
            .map_err(rejected)?;

        if existing > 0 {
            match self.settings.reapply_policy {
                ReapplyPolicy::Reject => {
                    return Err(AccelerationError::AlreadyApplied {
                        table: table.to_string(),
                    });
                }
                ReapplyPolicy::Tolerate => {
                    log::debug!("Acceleration index on '{table}' already present, keeping it");
                    return Ok(());
                }
            }
        }

        let if_missing = self.settings.reapply_policy == ReapplyPolicy::Tolerate;
        let started = Instant::now();
        conn.execute_batch(&self.dialect.create_acceleration(table, if_missing))
            .map_err(rejected)?;
        log::debug!(
            "Built acceleration index on '{table}' in {:.1}s",
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Provision, time, accelerate, time again. The first failure ends the
    /// run; nothing is retried or rolled back.
    pub fn run(&mut self, observer: &mut dyn RunObserver) -> Result<BenchmarkResult, BenchError> {
        log::info!(
            "Starting {} benchmark on '{}' ({} rows, reapply policy {})",
            self.dialect.name(),
            self.settings.table,
            self.settings.row_count,
            self.settings.reapply_policy
        );

        let row_count = self.settings.row_count;
        let dataset = self.stage(observer, Stage::Provision, |h| {
            Ok(h.provision_dataset(row_count)?)
        })?;
        observer.on_event(&RunEvent::Provisioned(&dataset));

        let without_index = self.stage(observer, Stage::QueryWithout, |h| h.checked_sample(&dataset))?;
        observer.on_event(&RunEvent::Timed(Stage::QueryWithout, &without_index));

        self.stage(observer, Stage::Accelerate, |h| {
            Ok(h.apply_acceleration(&dataset)?)
        })?;
        observer.on_event(&RunEvent::Accelerated(&dataset));

        let with_index = self.stage(observer, Stage::QueryWith, |h| h.checked_sample(&dataset))?;
        observer.on_event(&RunEvent::Timed(Stage::QueryWith, &with_index));

        let result = BenchmarkResult {
            dataset,
            without_index,
            with_index,
        };
        match result.ratio() {
            Some(ratio) => log::info!("Speedup with acceleration index: {ratio:.2}x"),
            None => log::warn!("Accelerated query took no measurable time; ratio undefined"),
        }
        Ok(result)
    }

    fn checked_sample(&mut self, dataset: &Dataset) -> Result<TimingSample, BenchError> {
        let sample = self.time_query(dataset)?;
        Self::verify_sum(dataset, &sample)?;
        Ok(sample)
    }

    fn stage<T>(
        &mut self,
        observer: &mut dyn RunObserver,
        stage: Stage,
        body: impl FnOnce(&mut Self) -> Result<T, BenchError>,
    ) -> Result<T, BenchError> {
        observer.on_event(&RunEvent::Started(stage));
        body(self).map_err(|err| {
            // Observer first so the console finishes its progress line.
            observer.on_event(&RunEvent::Failed(stage, &err));
            log::warn!("Stage '{stage}' failed, abandoning the run");
            err
        })
    }

    fn log_query_plan(&self, sql: &str) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        let Some(explain) = self.dialect.explain(sql) else {
            return;
        };

        let conn = self.session.connection();
        let plan = conn.prepare(&explain).and_then(|mut stmt| {
            let lines = stmt
                .query_map([], |row| row.get::<_, String>(3))?
                .collect::<rusqlite::Result<Vec<_>>>();
            lines
        });
        match plan {
            Ok(lines) => log::debug!("Plan for `{sql}`: {}", lines.join("; ")),
            Err(e) => log::warn!("Could not explain `{sql}`: {e}"),
        }
    }
}
