//! Capping
//!
//! Keeps the `cap` highest-ranked rows of the group and folds everything
//! else into a single "others" row. The others row records the keys it
//! absorbed, so clicking it filters on exactly those keys.
//!
//! Accessors are wrapped so an [`OthersRecord`] answers with its own key,
//! value and absorbed rows while every other row passes through untouched.

use crate::chart::{
    Chart, ClickFilter, DataAccessor, KeyAccessor, ValueAccessor,
};
use crate::data_types::{DataGroup, Datum, Filter, Key, Measure, OthersRecord, RawData};
use crate::error::{ChartError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{trace, warn};

pub const DEFAULT_OTHERS_LABEL: &str = "Others";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cap {
    #[default]
    Unbounded,
    Limit(usize),
}

impl Cap {
    /// Rejects negative counts.
    pub fn from_count(count: i64) -> Result<Self> {
        usize::try_from(count)
            .map(Self::Limit)
            .map_err(|_| ChartError::invalid(format!("cap must not be negative, got {count}")))
    }
}

impl From<usize> for Cap {
    fn from(n: usize) -> Self {
        Self::Limit(n)
    }
}

/// Builds the others row from the label and the rows outside the cap.
pub type OthersGrouper = dyn Fn(&Chart, &Key, Vec<Datum>) -> Result<OthersRecord> + Send + Sync;

/// Turns the absorbed rows into what the raw-data accessor exposes.
pub type OthersOut = dyn Fn(&[Datum]) -> Vec<Datum> + Send + Sync;

/// Default grouper: members through the chart's key accessor, value as the
/// sum of the chart's value accessor over the absorbed rows.
pub fn sum_others(chart: &Chart, label: &Key, rows: Vec<Datum>) -> Result<OthersRecord> {
    let key_of = chart.key_accessor()?;
    let value_of = chart.value_accessor()?;
    let members = rows.iter().map(|d| key_of(d)).collect();
    let value = rows
        .iter()
        .map(|d| value_of(d))
        .reduce(Measure::combine)
        .unwrap_or_default();
    Ok(OthersRecord {
        key: label.clone(),
        value,
        members,
        absorbed: rows,
    })
}

struct CapState {
    cap: Cap,
    label: String,
    grouper: Option<Arc<OthersGrouper>>,
    out: Arc<OthersOut>,
}

impl Default for CapState {
    fn default() -> Self {
        Self {
            cap: Cap::Unbounded,
            label: DEFAULT_OTHERS_LABEL.to_string(),
            grouper: Some(Arc::new(sum_others)),
            out: Arc::new(|rows: &[Datum]| rows.to_vec()),
        }
    }
}

/// Group stage applying the cap over the stage below it.
struct CappedGroup {
    inner: Arc<dyn DataGroup>,
    state: Arc<RwLock<CapState>>,
}

impl DataGroup for CappedGroup {
    fn all(&self, chart: &Chart) -> Result<Vec<Datum>> {
        let (cap, label, grouper) = {
            let state = self.state.read();
            (state.cap, Key::text(state.label.as_str()), state.grouper.clone())
        };
        let n = match cap {
            Cap::Unbounded => return self.inner.all(chart),
            Cap::Limit(n) => n,
        };

        let mut top = self.inner.top(chart, n)?;
        let key_of = chart.key_accessor()?;
        let kept: HashSet<Key> = top.iter().map(|d| key_of(d)).collect();
        let others: Vec<Datum> = self
            .inner
            .all(chart)?
            .into_iter()
            .filter(|d| !kept.contains(&key_of(d)))
            .collect();
        trace!(kept = top.len(), folded = others.len(), "cap applied");
        if kept.contains(&label) {
            warn!(%label, "others label collides with a kept key");
        }

        if let (false, Some(grouper)) = (others.is_empty(), grouper) {
            let record = grouper(chart, &label, others)?;
            if record.members.is_empty() {
                return Err(ChartError::invalid(
                    "others grouper produced an entry without members",
                ));
            }
            top.push(Datum::Others(record));
        }
        Ok(top)
    }

    fn top(&self, chart: &Chart, n: usize) -> Result<Vec<Datum>> {
        let value_of = chart.value_accessor()?;
        let mut ranked: Vec<(f64, Datum)> = self
            .all(chart)?
            .into_iter()
            .map(|d| (value_of(&d).total(), d))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(ranked.into_iter().take(n).map(|(_, d)| d).collect())
    }
}

/// Handle on the capping behavior installed on a chart.
#[derive(Clone)]
pub struct CapMixin {
    state: Arc<RwLock<CapState>>,
}

impl CapMixin {
    /// Wraps `group`, the key/value/data accessors and click handling of
    /// `chart`. All of them must already be installed.
    pub fn install(chart: &mut Chart) -> Result<Self> {
        let ops = chart.ops_mut();
        ops.group.ensure_installed()?;
        ops.key_accessor.ensure_installed()?;
        ops.value_accessor.ensure_installed()?;
        ops.data_accessor.ensure_installed()?;
        ops.client_data_accessor.ensure_installed()?;
        ops.click_filter.ensure_installed()?;

        let state = Arc::new(RwLock::new(CapState::default()));

        ops.key_accessor.override_with(|inner: Arc<KeyAccessor>| -> Arc<KeyAccessor> {
            Arc::new(move |d: &Datum| match d {
                Datum::Others(o) => o.key.clone(),
                _ => inner(d),
            })
        })?;

        ops.value_accessor
            .override_with(|inner: Arc<ValueAccessor>| -> Arc<ValueAccessor> {
                Arc::new(move |d: &Datum| match d {
                    Datum::Others(o) => o.value.clone(),
                    _ => inner(d),
                })
            })?;

        let data_state = state.clone();
        ops.data_accessor.override_with(move |inner: Arc<DataAccessor>| {
            others_data_accessor(inner, data_state.clone())
        })?;
        let client_state = state.clone();
        ops.client_data_accessor
            .override_with(move |inner: Arc<DataAccessor>| {
                others_data_accessor(inner, client_state.clone())
            })?;

        let group_state = state.clone();
        ops.group.override_with(move |inner: Arc<dyn DataGroup>| -> Arc<dyn DataGroup> {
            Arc::new(CappedGroup {
                inner,
                state: group_state.clone(),
            })
        })?;

        ops.click_filter
            .override_with(|inner: Arc<ClickFilter>| -> Arc<ClickFilter> {
                Arc::new(move |chart: &Chart, d: &Datum| match d {
                    Datum::Others(o) => Ok(Filter::AnyOf(o.members.clone())),
                    _ => inner(chart, d),
                })
            })?;

        Ok(Self { state })
    }

    pub fn cap(&self) -> Cap {
        self.state.read().cap
    }

    pub fn set_cap(&self, cap: Cap) {
        self.state.write().cap = cap;
    }

    /// Sets a numeric cap, rejecting negative counts.
    pub fn set_cap_count(&self, count: i64) -> Result<()> {
        self.set_cap(Cap::from_count(count)?);
        Ok(())
    }

    pub fn others_label(&self) -> String {
        self.state.read().label.clone()
    }

    pub fn set_others_label(&self, label: impl Into<String>) {
        self.state.write().label = label.into();
    }

    pub fn others_grouper(&self) -> Option<Arc<OthersGrouper>> {
        self.state.read().grouper.clone()
    }

    pub fn set_others_grouper(
        &self,
        grouper: impl Fn(&Chart, &Key, Vec<Datum>) -> Result<OthersRecord> + Send + Sync + 'static,
    ) {
        self.state.write().grouper = Some(Arc::new(grouper));
    }

    /// Drops the rows outside the cap instead of folding them.
    pub fn disable_others(&self) {
        self.state.write().grouper = None;
    }

    pub fn others_out(&self) -> Arc<OthersOut> {
        self.state.read().out.clone()
    }

    pub fn set_others_out(&self, out: impl Fn(&[Datum]) -> Vec<Datum> + Send + Sync + 'static) {
        self.state.write().out = Arc::new(out);
    }
}

impl std::fmt::Debug for CapMixin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("CapMixin")
            .field("cap", &state.cap)
            .field("label", &state.label)
            .field("others", &state.grouper.is_some())
            .finish()
    }
}

fn others_data_accessor(inner: Arc<DataAccessor>, state: Arc<RwLock<CapState>>) -> Arc<DataAccessor> {
    Arc::new(move |d: &Datum| match d {
        Datum::Others(o) => {
            let out = state.read().out.clone();
            RawData::Many(out(&o.absorbed).iter().map(|m| inner(m)).collect())
        }
        _ => inner(d),
    })
}
