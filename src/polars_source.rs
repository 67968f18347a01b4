#![cfg(feature = "polars")]

use crate::data_types::{GroupedSource, Key, Record, VecGroup};
use eyre::WrapErr;
use polars::prelude::*;
use tracing::debug;

/// Grouped source summing `value_col` per distinct `key_col` of a frame.
/// Groups keep the order in which their keys first appear.
pub struct PolarsGroup {
    inner: VecGroup,
    key_col: String,
    value_col: String,
}

impl PolarsGroup {
    pub fn new(df: &DataFrame, key_col: &str, value_col: &str) -> eyre::Result<Self> {
        let mut group = Self {
            inner: VecGroup::new(Vec::new()),
            key_col: key_col.to_string(),
            value_col: value_col.to_string(),
        };
        group.refresh(df)?;
        Ok(group)
    }

    /// Re-aggregates from a new frame with the same columns.
    pub fn refresh(&mut self, df: &DataFrame) -> eyre::Result<()> {
        let out = df
            .clone()
            .lazy()
            .group_by_stable([col(self.key_col.as_str())])
            .agg([col(self.value_col.as_str())
                .cast(DataType::Float64)
                .sum()
                .alias("__sum")])
            .collect()
            .wrap_err_with(|| format!("failed to group by `{}`", self.key_col))?;

        let keys = read_keys(out.column(self.key_col.as_str())?.as_materialized_series())?;
        let sums = out.column("__sum")?.as_materialized_series().f64()?;

        let mut records = Vec::with_capacity(keys.len());
        let mut skipped = 0usize;
        for (key, sum) in keys.into_iter().zip(sums.into_iter()) {
            match key {
                Some(key) => records.push(Record::new(key, sum.unwrap_or(0.0))),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!(skipped, column = %self.key_col, "null keys ignored");
        }
        self.inner.set_data(records);
        Ok(())
    }
}

fn read_keys(series: &Series) -> eyre::Result<Vec<Option<Key>>> {
    let dtype = series.dtype();
    let keys = if dtype.is_integer() {
        let cast = series.cast(&DataType::Int64)?;
        cast.i64()?.into_iter().map(|v| v.map(Key::from)).collect()
    } else if dtype.is_float() {
        let cast = series.cast(&DataType::Float64)?;
        cast.f64()?.into_iter().map(|v| v.map(Key::from)).collect()
    } else {
        let cast = series
            .cast(&DataType::String)
            .wrap_err_with(|| format!("unsupported key type {dtype}"))?;
        cast.str()?.into_iter().map(|v| v.map(Key::from)).collect()
    };
    Ok(keys)
}

impl GroupedSource for PolarsGroup {
    fn all(&self) -> Vec<Record> {
        self.inner.all()
    }

    fn top(&self, n: usize) -> Vec<Record> {
        self.inner.top(n)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}
