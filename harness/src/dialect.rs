//! SQL text for each statement the harness issues.
//!
//! The harness never builds SQL itself; it asks a [`Dialect`] and passes the
//! string through to the store. Table names reaching a dialect have already
//! been checked by [`crate::config::validate_identifier`].

use crate::dataset::MAX_ROW_COUNT;

pub trait Dialect {
    /// Human-readable name for logs and reports.
    fn name(&self) -> &'static str;

    /// Remove the dataset table if it exists.
    fn drop_dataset(&self, table: &str) -> String;

    /// Create the empty dataset table.
    fn create_dataset(&self, table: &str) -> String;

    /// Fill the table with rows `1..=row_count` in one insert-via-select.
    fn populate_dataset(&self, table: &str, row_count: u64) -> String;

    /// Full-table `SUM(price)`, returning a single scalar.
    fn sum_price(&self, table: &str) -> String;

    /// Build the acceleration structure. With `if_missing` set an existing
    /// structure is left alone instead of rejected.
    fn create_acceleration(&self, table: &str, if_missing: bool) -> String;

    /// Query returning a single count: 1 when the acceleration structure
    /// exists, 0 otherwise.
    fn acceleration_exists(&self, table: &str) -> String;

    /// `COUNT(*)` over the dataset table.
    fn count_rows(&self, table: &str) -> String;

    /// Rows with keys between `?1` and `?2` inclusive, in key order, as
    /// `(order_item_id, order_id, price, product_name)`.
    fn select_rows(&self, table: &str) -> String;

    /// Wrap `sql` so it returns the query plan, if the store can do that.
    fn explain(&self, _sql: &str) -> Option<String> {
        None
    }
}

/// Statements for SQLite.
///
/// The acceleration structure is a covering index on `price`: SQLite then
/// answers `SUM(price)` by scanning the narrow index b-tree instead of the
/// table rows with their product labels.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl SqliteDialect {
    pub fn acceleration_name(table: &str) -> String {
        format!("{table}_price_accel")
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn drop_dataset(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS \"{table}\";")
    }

    fn create_dataset(&self, table: &str) -> String {
        format!(
            "CREATE TABLE \"{table}\" (
                order_item_id INTEGER PRIMARY KEY,
                order_id      INTEGER NOT NULL,
                price         INTEGER NOT NULL,
                product_name  TEXT    NOT NULL
            );"
        )
    }

    fn populate_dataset(&self, table: &str, row_count: u64) -> String {
        let row_count = row_count.min(MAX_ROW_COUNT);
        // n counts 0..row_count; draw i is decimal digit i of n (most
        // significant first) plus one.
        format!(
            "WITH RECURSIVE
                seq(n) AS (
                    SELECT 0 WHERE 0 < {row_count}
                    UNION ALL
                    SELECT n + 1 FROM seq WHERE n + 1 < {row_count}
                ),
                draws(k, a, b, c, d, e, f, g, h) AS (
                    SELECT n + 1,
                           n / 10000000 % 10 + 1,
                           n / 1000000 % 10 + 1,
                           n / 100000 % 10 + 1,
                           n / 10000 % 10 + 1,
                           n / 1000 % 10 + 1,
                           n / 100 % 10 + 1,
                           n / 10 % 10 + 1,
                           n % 10 + 1
                    FROM seq
                )
            INSERT INTO \"{table}\" (order_item_id, order_id, price, product_name)
            SELECT k,
                   a + b + c + d + e + f + g + h,
                   a * 10,
                   a || ' ' || b || ' ' || c || ' ' || d || ' ' || e || ' ' || f || ' ' || g || ' ' || h
            FROM draws;"
        )
    }

    fn sum_price(&self, table: &str) -> String {
        format!("SELECT SUM(price) FROM \"{table}\"")
    }

    fn create_acceleration(&self, table: &str, if_missing: bool) -> String {
        let guard = if if_missing { "IF NOT EXISTS " } else { "" };
        format!(
            "CREATE INDEX {guard}\"{}\" ON \"{table}\" (price);",
            Self::acceleration_name(table)
        )
    }

    fn acceleration_exists(&self, table: &str) -> String {
        format!(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = '{}'",
            Self::acceleration_name(table)
        )
    }

    fn count_rows(&self, table: &str) -> String {
        format!("SELECT COUNT(*) FROM \"{table}\"")
    }

    fn select_rows(&self, table: &str) -> String {
        format!(
            "SELECT order_item_id, order_id, price, product_name FROM \"{table}\" \
             WHERE order_item_id BETWEEN ?1 AND ?2 ORDER BY order_item_id"
        )
    }

    fn explain(&self, sql: &str) -> Option<String> {
        Some(format!("EXPLAIN QUERY PLAN {sql}"))
    }
}
