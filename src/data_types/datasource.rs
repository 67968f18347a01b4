use super::record::{Datum, Record, Value};
use crate::chart::Chart;
use crate::error::Result;
use std::sync::Arc;

/// Externally aggregated key/value data.
pub trait GroupedSource: Send + Sync {
    /// Every aggregate, in the source's own order.
    fn all(&self) -> Vec<Record>;

    /// The `n` highest-valued aggregates, descending. Ties follow the
    /// source's own stable rule.
    fn top(&self, n: usize) -> Vec<Record>;

    fn len(&self) -> usize {
        self.all().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lets a source be shared with the code that refreshes it.
impl<T: GroupedSource> GroupedSource for parking_lot::RwLock<T> {
    fn all(&self) -> Vec<Record> {
        self.read().all()
    }

    fn top(&self, n: usize) -> Vec<Record> {
        self.read().top(n)
    }

    fn len(&self) -> usize {
        self.read().len()
    }
}

pub type RankFn = dyn Fn(&Value) -> f64 + Send + Sync;

/// In-memory grouped source.
pub struct VecGroup {
    records: Vec<Record>,
    rank: Option<Arc<RankFn>>,
}

impl VecGroup {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            rank: None,
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<super::Key>,
        V: Into<Value>,
    {
        Self::new(pairs.into_iter().map(|(k, v)| Record::new(k, v)).collect())
    }

    /// Ranks `top` by a custom function of the value instead of the value
    /// itself (needed when values are objects).
    pub fn with_rank(mut self, rank: impl Fn(&Value) -> f64 + Send + Sync + 'static) -> Self {
        self.rank = Some(Arc::new(rank));
        self
    }

    pub fn set_data(&mut self, records: Vec<Record>) {
        self.records = records;
    }

    pub fn add_data(&mut self, record: Record) {
        self.records.push(record);
    }

    fn rank_of(&self, record: &Record) -> f64 {
        let v = match &self.rank {
            Some(rank) => rank(&record.value),
            None => record.number().unwrap_or(f64::NAN),
        };
        if v.is_nan() {
            f64::NEG_INFINITY
        } else {
            v
        }
    }
}

impl GroupedSource for VecGroup {
    fn all(&self) -> Vec<Record> {
        self.records.clone()
    }

    fn top(&self, n: usize) -> Vec<Record> {
        let mut ranked: Vec<(f64, &Record)> =
            self.records.iter().map(|r| (self.rank_of(r), r)).collect();
        // stable: equal values keep source order
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.into_iter().take(n).map(|(_, r)| r.clone()).collect()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// A pipeline stage producing tagged rows. Capping and stacking install
/// their own stages over the chart's base stage.
pub trait DataGroup: Send + Sync {
    fn all(&self, chart: &Chart) -> Result<Vec<Datum>>;

    fn top(&self, chart: &Chart, n: usize) -> Result<Vec<Datum>>;
}

/// Base stage: exposes a [`GroupedSource`] as plain rows.
#[derive(Clone)]
pub struct SourceGroup {
    source: Arc<dyn GroupedSource>,
}

impl SourceGroup {
    pub fn new(source: Arc<dyn GroupedSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn GroupedSource> {
        &self.source
    }
}

impl DataGroup for SourceGroup {
    fn all(&self, _chart: &Chart) -> Result<Vec<Datum>> {
        Ok(self.source.all().into_iter().map(Datum::Plain).collect())
    }

    fn top(&self, _chart: &Chart, n: usize) -> Result<Vec<Datum>> {
        Ok(self.source.top(n).into_iter().map(Datum::Plain).collect())
    }
}
