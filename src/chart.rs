//! Chart Model
//!
//! `Chart` is the shared object every mixin extends. It owns one
//! [`OverrideChain`] per overridable operation (group, accessors, data,
//! click handling) plus the state that no mixin owns: the active filters,
//! the color scale, the chart title and the axis padding.
//!
//! [`Chart::new`] installs the base implementation of every operation.
//! Mixins such as [`crate::cap::CapMixin`] and [`crate::stack::StackMixin`]
//! then wrap those operations; they fail with
//! [`ChartError::MissingOperation`] on a [`Chart::bare`] chart.

use crate::data_types::{
    DataGroup, Datum, Filter, GroupedSource, Key, LayerSeries, Measure, PointData, RawData,
    Record, SourceGroup, StackedPoint, Value, VecGroup,
};
use crate::error::{ChartError, Result};
use crate::override_chain::OverrideChain;
use crate::theme::{Color, ColorScale, OrdinalColors};
use std::sync::Arc;
use tracing::debug;

pub type KeyAccessor = dyn Fn(&Datum) -> Key + Send + Sync;
pub type ValueAccessor = dyn Fn(&Datum) -> Measure + Send + Sync;
pub type DataAccessor = dyn Fn(&Datum) -> RawData + Send + Sync;
pub type ColorAccessor = dyn Fn(&Chart, &PointData) -> Result<Key> + Send + Sync;
pub type DataFn = dyn Fn(&Chart) -> Result<Vec<LayerSeries>> + Send + Sync;
pub type ClickFilter = dyn Fn(&Chart, &Datum) -> Result<Filter> + Send + Sync;
pub type TitleFn = dyn Fn(&RawData) -> String + Send + Sync;
pub type FilterHandler = dyn Fn(&[Filter]) + Send + Sync;
pub type GroupHook = dyn Fn(Option<&str>) + Send + Sync;

#[derive(Debug)]
pub struct Operations {
    pub group: OverrideChain<dyn DataGroup>,
    pub key_accessor: OverrideChain<KeyAccessor>,
    pub value_accessor: OverrideChain<ValueAccessor>,
    /// Raw data behind an element, for tooltips and ordering.
    pub data_accessor: OverrideChain<DataAccessor>,
    /// What client callbacks (titles, ordering) see.
    pub client_data_accessor: OverrideChain<DataAccessor>,
    pub color_accessor: OverrideChain<ColorAccessor>,
    pub data: OverrideChain<DataFn>,
    pub click_filter: OverrideChain<ClickFilter>,
}

impl Default for Operations {
    fn default() -> Self {
        Self {
            group: OverrideChain::new("group"),
            key_accessor: OverrideChain::new("key_accessor"),
            value_accessor: OverrideChain::new("value_accessor"),
            data_accessor: OverrideChain::new("data_accessor"),
            client_data_accessor: OverrideChain::new("client_data_accessor"),
            color_accessor: OverrideChain::new("color_accessor"),
            data: OverrideChain::new("data"),
            click_filter: OverrideChain::new("click_filter"),
        }
    }
}

pub struct Chart {
    ops: Operations,
    group_name: Option<String>,
    group_bound: bool,
    group_hooks: Vec<Arc<GroupHook>>,
    filters: Vec<Filter>,
    filter_handler: Option<Arc<FilterHandler>>,
    colors: Arc<dyn ColorScale>,
    title: Arc<TitleFn>,
    y_axis_padding: f64,
}

impl Default for Chart {
    fn default() -> Self {
        Self::new()
    }
}

impl Chart {
    pub fn new() -> Self {
        let mut chart = Self::bare();
        chart.install_base();
        chart
    }

    /// A chart without any operation installed.
    pub fn bare() -> Self {
        Self {
            ops: Operations::default(),
            group_name: None,
            group_bound: false,
            group_hooks: Vec::new(),
            filters: Vec::new(),
            filter_handler: None,
            colors: Arc::new(OrdinalColors::default()),
            title: Arc::new(default_title),
            y_axis_padding: 0.0,
        }
    }

    /// Installs the base operations. Wrappers already layered over an
    /// operation are kept, and so is a bound group.
    pub fn install_base(&mut self) {
        if !self.ops.group.is_installed() {
            self.ops
                .group
                .install(Arc::new(SourceGroup::new(Arc::new(VecGroup::new(Vec::new())))));
        }
        self.ops
            .key_accessor
            .install(Arc::new(|d: &Datum| d.key().clone()));
        self.set_value_accessor(|r: &Record| r.number().unwrap_or(0.0));
        let raw: Arc<DataAccessor> = Arc::new(|d: &Datum| match d {
            Datum::Plain(r) => RawData::Record(r.clone()),
            _ => RawData::Missing,
        });
        self.ops.data_accessor.install(raw.clone());
        self.ops.client_data_accessor.install(raw);
        self.ops
            .color_accessor
            .install(Arc::new(|chart: &Chart, point: &PointData| -> Result<Key> {
                Ok(chart.key_accessor()?(&point.datum))
            }));
        self.ops.data.install(Arc::new(base_data));
        self.ops
            .click_filter
            .install(Arc::new(|chart: &Chart, datum: &Datum| -> Result<Filter> {
                Ok(Filter::Key(chart.key_accessor()?(datum)))
            }));
    }

    pub fn ops(&self) -> &Operations {
        &self.ops
    }

    pub fn ops_mut(&mut self) -> &mut Operations {
        &mut self.ops
    }

    // --- group ---

    /// Binds the primary grouped source. Hooks registered through
    /// [`Chart::on_group_change`] run afterwards.
    pub fn set_group(&mut self, source: Arc<dyn GroupedSource>, name: Option<&str>) {
        self.group_name = name.map(str::to_string);
        self.group_bound = true;
        self.ops.group.install(Arc::new(SourceGroup::new(source)));
        for hook in self.group_hooks.clone() {
            hook(name);
        }
    }

    pub fn group_name(&self) -> Option<&str> {
        self.group_name.as_deref()
    }

    pub fn has_group(&self) -> bool {
        self.group_bound
    }

    pub fn on_group_change(&mut self, hook: impl Fn(Option<&str>) + Send + Sync + 'static) {
        self.group_hooks.push(Arc::new(hook));
    }

    pub fn group(&self) -> Result<Arc<dyn DataGroup>> {
        self.ops.group.get()
    }

    pub fn all(&self) -> Result<Vec<Datum>> {
        self.group()?.all(self)
    }

    // --- accessors ---

    pub fn key_accessor(&self) -> Result<Arc<KeyAccessor>> {
        self.ops.key_accessor.get()
    }

    /// Replaces the base key accessor. Rows that are not plain records
    /// keep their own key.
    pub fn set_key_accessor(&mut self, f: impl Fn(&Record) -> Key + Send + Sync + 'static) {
        self.ops.key_accessor.install(Arc::new(move |d: &Datum| match d {
            Datum::Plain(r) => f(r),
            other => other.key().clone(),
        }));
    }

    pub fn value_accessor(&self) -> Result<Arc<ValueAccessor>> {
        self.ops.value_accessor.get()
    }

    /// Replaces the base value accessor. It only sees plain records; other
    /// row shapes must be resolved by the mixin that produced them and
    /// measure as NaN if they reach the base.
    pub fn set_value_accessor(&mut self, f: impl Fn(&Record) -> f64 + Send + Sync + 'static) {
        self.ops.value_accessor.install(Arc::new(move |d: &Datum| {
            Measure::Scalar(d.as_record().map_or(f64::NAN, &f))
        }));
    }

    pub fn data_accessor(&self) -> Result<Arc<DataAccessor>> {
        self.ops.data_accessor.get()
    }

    pub fn client_data_accessor(&self) -> Result<Arc<DataAccessor>> {
        self.ops.client_data_accessor.get()
    }

    pub fn color_accessor(&self) -> Result<Arc<ColorAccessor>> {
        self.ops.color_accessor.get()
    }

    pub fn set_color_accessor(&mut self, f: impl Fn(&PointData) -> Key + Send + Sync + 'static) {
        self.ops
            .color_accessor
            .install(Arc::new(move |_: &Chart, point: &PointData| -> Result<Key> {
                Ok(f(point))
            }));
    }

    // --- colors and titles ---

    pub fn colors(&self) -> &Arc<dyn ColorScale> {
        &self.colors
    }

    pub fn set_colors(&mut self, colors: Arc<dyn ColorScale>) {
        self.colors = colors;
    }

    pub fn get_color(&self, point: &PointData) -> Result<Color> {
        let key = self.color_accessor()?(self, point)?;
        Ok(self.colors.color(&key))
    }

    pub fn title(&self) -> Arc<TitleFn> {
        self.title.clone()
    }

    pub fn set_title(&mut self, f: impl Fn(&RawData) -> String + Send + Sync + 'static) {
        self.title = Arc::new(f);
    }

    // --- data ---

    pub fn data(&self) -> Result<Vec<LayerSeries>> {
        self.ops.data.get()?(self)
    }

    // --- filtering ---

    pub fn on_click(&mut self, datum: &Datum) -> Result<Filter> {
        let resolve = self.ops.click_filter.get()?;
        let filter = resolve(self, datum)?;
        self.toggle_filter(filter.clone());
        Ok(filter)
    }

    pub fn toggle_filter(&mut self, filter: Filter) {
        match self.filters.iter().position(|f| *f == filter) {
            Some(pos) => {
                debug!(?filter, "filter removed");
                self.filters.remove(pos);
            }
            None => {
                debug!(?filter, "filter added");
                self.filters.push(filter);
            }
        }
        if let Some(handler) = &self.filter_handler {
            handler(&self.filters);
        }
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn has_filter(&self) -> bool {
        !self.filters.is_empty()
    }

    pub fn has_filter_for(&self, key: &Key) -> bool {
        self.filters.iter().any(|f| f.matches(key))
    }

    pub fn filter_all(&mut self) {
        self.filters.clear();
        if let Some(handler) = &self.filter_handler {
            handler(&self.filters);
        }
    }

    /// Receives the full filter list after every change, typically to push
    /// it into the aggregation engine.
    pub fn set_filter_handler(&mut self, handler: impl Fn(&[Filter]) + Send + Sync + 'static) {
        self.filter_handler = Some(Arc::new(handler));
    }

    // --- extents ---

    pub fn y_axis_padding(&self) -> f64 {
        self.y_axis_padding
    }

    pub fn set_y_axis_padding(&mut self, padding: f64) -> Result<()> {
        if !padding.is_finite() {
            return Err(ChartError::invalid(format!(
                "y axis padding must be finite, got {padding}"
            )));
        }
        self.y_axis_padding = padding;
        Ok(())
    }

    fn flatten(&self) -> Result<Vec<StackedPoint>> {
        Ok(self.data()?.into_iter().flat_map(|s| s.values).collect())
    }

    // Extents include padding and are `None` without points.
    pub fn y_axis_min(&self) -> Result<Option<f64>> {
        let min = self
            .flatten()?
            .iter()
            .map(StackedPoint::low)
            .filter(|v| !v.is_nan())
            .reduce(f64::min);
        Ok(min.map(|m| m - self.y_axis_padding))
    }

    pub fn y_axis_max(&self) -> Result<Option<f64>> {
        let max = self
            .flatten()?
            .iter()
            .map(StackedPoint::top)
            .filter(|v| !v.is_nan())
            .reduce(f64::max);
        Ok(max.map(|m| m + self.y_axis_padding))
    }

    pub fn x_axis_min(&self) -> Result<Option<Key>> {
        Ok(self.flatten()?.into_iter().map(|p| p.x).min())
    }

    pub fn x_axis_max(&self) -> Result<Option<Key>> {
        Ok(self.flatten()?.into_iter().map(|p| p.x).max())
    }

    pub fn ordinal_x_domain(&self) -> Result<Vec<Key>> {
        let keys: indexmap::IndexSet<Key> = self.flatten()?.into_iter().map(|p| p.x).collect();
        Ok(keys.into_iter().collect())
    }
}

impl std::fmt::Debug for Chart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chart")
            .field("ops", &self.ops)
            .field("group_name", &self.group_name)
            .field("filters", &self.filters)
            .field("y_axis_padding", &self.y_axis_padding)
            .finish()
    }
}

fn base_data(chart: &Chart) -> Result<Vec<LayerSeries>> {
    let rows = chart.all()?;
    let key_of = chart.key_accessor()?;
    let value_of = chart.value_accessor()?;
    let values = rows
        .into_iter()
        .map(|datum| StackedPoint {
            x: key_of(&datum),
            y: value_of(&datum).total(),
            y0: 0.0,
            data: PointData { datum, layer: None },
        })
        .collect();
    Ok(vec![LayerSeries {
        name: chart.group_name().unwrap_or("0").to_string(),
        values,
    }])
}

fn default_title(raw: &RawData) -> String {
    match raw {
        RawData::Record(r) => format!("{}: {}", r.key, display_value(&r.value)),
        RawData::Many(items) => items
            .iter()
            .map(default_title)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        RawData::Missing => String::new(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
