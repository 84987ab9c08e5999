//! Multi-row parameterized updates.
//!
//! A batch update joins the target table against an inline `VALUES` list so a
//! whole flush phase is applied in one statement:
//!
//! ```sql
//! UPDATE spatial_metrics AS t SET state = 'error', error_message = v.error
//! FROM (VALUES ($1::text, $2::text), ($3::text, $4::text)) AS v(job_key, error)
//! WHERE t.job_key = v.job_key AND t.state <> 'complete'
//! ```
//!
//! Every bound value is cast to its declared column type, since Postgres cannot
//! infer parameter types inside a `VALUES` list used as a join source.

use sqlx::query_builder::Separated;
use sqlx::{Encode, Postgres, QueryBuilder, Type};

use crate::core::client::database::DatabaseError;

/// A column of the `VALUES` list: its alias in `v(...)` and the SQL type bound
/// values are cast to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchColumn {
    pub name: &'static str,
    pub sql_type: &'static str,
}

impl BatchColumn {
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self { name, sql_type }
    }
}

/// A row struct that can be bound into a batch update.
///
/// `bind_columns` must bind exactly one value per entry of `COLUMNS`, in order.
/// The builder rejects rows that bind a different number of values.
pub trait BatchRow {
    const COLUMNS: &'static [BatchColumn];

    fn bind_columns(&self, binder: &mut RowBinder<'_, 'static>);
}

/// Binds the values of one row, casting each to the type of its column.
pub struct RowBinder<'qb, 'args> {
    separated: Separated<'qb, 'args, Postgres, &'static str>,
    columns: &'static [BatchColumn],
    bound: usize,
}

impl<'qb, 'args> RowBinder<'qb, 'args> {
    fn new(separated: Separated<'qb, 'args, Postgres, &'static str>, columns: &'static [BatchColumn]) -> Self {
        Self { separated, columns, bound: 0 }
    }

    pub fn bind<T>(&mut self, value: T) -> &mut Self
    where
        T: 'args + Encode<'args, Postgres> + Type<Postgres> + Send,
    {
        self.separated.push_bind(value);
        if let Some(column) = self.columns.get(self.bound) {
            self.separated.push_unseparated(format!("::{}", column.sql_type));
        }
        self.bound += 1;
        self
    }
}

/// Shape of a batch update: the target table, the `SET` assignments (which may
/// reference the target as `t` and the incoming row as `v`) and an optional
/// extra `WHERE` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchUpdate<'a> {
    pub table: &'a str,
    pub assignments: &'a [&'a str],
    pub guard: Option<&'a str>,
}

/// Builds the batch update statement for `rows`, joined to the target table on
/// `job_key`. Every row type must therefore declare a `job_key` column.
pub fn build_batch_update<R: BatchRow>(
    update: &BatchUpdate<'_>,
    rows: &[R],
) -> Result<QueryBuilder<'static, Postgres>, DatabaseError> {
    if rows.is_empty() {
        return Err(DatabaseError::EmptyBatch);
    }

    let mut builder =
        QueryBuilder::new(format!("UPDATE {} AS t SET {} FROM (", update.table, update.assignments.join(", ")));

    let mut mismatch = None;
    builder.push_values(rows, |separated, row| {
        let mut binder = RowBinder::new(separated, R::COLUMNS);
        row.bind_columns(&mut binder);
        if binder.bound != R::COLUMNS.len() && mismatch.is_none() {
            mismatch = Some(DatabaseError::ColumnCountMismatch { expected: R::COLUMNS.len(), found: binder.bound });
        }
    });
    if let Some(error) = mismatch {
        return Err(error);
    }

    let aliases = R::COLUMNS.iter().map(|column| column.name).collect::<Vec<_>>().join(", ");
    builder.push(format!(") AS v({}) WHERE t.job_key = v.job_key", aliases));
    if let Some(guard) = update.guard {
        builder.push(" AND ").push(guard);
    }

    Ok(builder)
}
