//! The synthetic dataset: row formula, closed-form checks and table helpers.
//!
//! Row `k` (1-based) is the `k`-th combination of an 8-way cross join over
//! the draws `1..=10`, enumerated in ascending lexicographic order. The draws
//! are therefore the base-10 digits of `k - 1`, zero-padded to eight digits,
//! each plus one:
//!
//! | key         | draws             | order_id | price | product_name        |
//! |-------------|-------------------|----------|-------|---------------------|
//! | 1           | 1 1 1 1 1 1 1 1   | 8        | 10    | `1 1 1 1 1 1 1 1`   |
//! | 2           | 1 1 1 1 1 1 1 2   | 9        | 10    | `1 1 1 1 1 1 1 2`   |
//! | 10_000_001  | 2 1 1 1 1 1 1 1   | 9        | 20    | `2 1 1 1 1 1 1 1`   |
//! | 100_000_000 | 10 10 … 10        | 80       | 100   | `10 10 … 10`        |

use rusqlite::Connection;

use crate::dialect::Dialect;

/// Number of independent draws per row.
pub const DRAW_COUNT: usize = 8;

/// Draws are taken from `1..=DRAW_DOMAIN`.
pub const DRAW_DOMAIN: u64 = 10;

/// Size of the full cross join, and so the largest dataset that can be built.
pub const MAX_ROW_COUNT: u64 = 100_000_000;

/// Default dataset size.
pub const DEFAULT_ROW_COUNT: u64 = 5_000_000;

/// Rows sharing the same first draw (and therefore the same price).
const ROWS_PER_PRICE: u64 = MAX_ROW_COUNT / DRAW_DOMAIN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub order_item_id: i64,
    pub order_id: i64,
    pub price: i64,
    pub product_name: String,
}

impl Row {
    /// Build the row stored under `key`.
    ///
    /// `key` must be in `1..=MAX_ROW_COUNT`.
    pub fn from_key(key: u64) -> Row {
        debug_assert!((1..=MAX_ROW_COUNT).contains(&key));
        let draws = draws_for_key(key);

        Row {
            order_item_id: key as i64,
            order_id: draws.iter().map(|&d| d as i64).sum(),
            price: draws[0] as i64 * 10,
            product_name: draws
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// The eight draws behind `key`, most significant first.
pub fn draws_for_key(key: u64) -> [u8; DRAW_COUNT] {
    let mut rest = key - 1;
    let mut draws = [0u8; DRAW_COUNT];
    for slot in draws.iter_mut().rev() {
        *slot = (rest % DRAW_DOMAIN + 1) as u8;
        rest /= DRAW_DOMAIN;
    }
    draws
}

/// Rows `1..=row_count` in key order.
pub fn rows(row_count: u64) -> impl Iterator<Item = Row> {
    (1..=row_count.min(MAX_ROW_COUNT)).map(Row::from_key)
}

/// `SUM(price)` over the first `row_count` rows.
///
/// Prices only change every [`ROWS_PER_PRICE`] keys, so the sum is a run of
/// full price blocks plus one partial block.
pub fn expected_price_sum(row_count: u64) -> i64 {
    let row_count = row_count.min(MAX_ROW_COUNT);
    let full_blocks = row_count / ROWS_PER_PRICE;
    let remainder = row_count % ROWS_PER_PRICE;

    // Block b (0-based) has price 10 * (b + 1).
    let full = ROWS_PER_PRICE * 10 * (full_blocks * (full_blocks + 1) / 2);
    let partial = remainder * 10 * (full_blocks + 1);
    (full + partial) as i64
}

/// A provisioned table and the number of rows it was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    name: String,
    row_count: u64,
}

impl Dataset {
    pub fn new(name: impl Into<String>, row_count: u64) -> Self {
        Self {
            name: name.into(),
            row_count,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Sum the aggregation must return for this dataset.
    pub fn expected_price_sum(&self) -> i64 {
        expected_price_sum(self.row_count)
    }

    /// Count the rows actually stored.
    pub fn count_rows(&self, conn: &Connection, dialect: &dyn Dialect) -> rusqlite::Result<u64> {
        let count: i64 = conn.query_row(&dialect.count_rows(&self.name), [], |r| r.get(0))?;
        Ok(count as u64)
    }

    /// Read back the rows with keys in `first..=last`, in key order.
    pub fn load_rows(
        &self,
        conn: &Connection,
        dialect: &dyn Dialect,
        first: u64,
        last: u64,
    ) -> rusqlite::Result<Vec<Row>> {
        let mut stmt = conn.prepare(&dialect.select_rows(&self.name))?;
        let rows = stmt.query_map([first as i64, last as i64], |r| {
            Ok(Row {
                order_item_id: r.get(0)?,
                order_id: r.get(1)?,
                price: r.get(2)?,
                product_name: r.get(3)?,
            })
        })?;
        rows.collect()
    }
}
