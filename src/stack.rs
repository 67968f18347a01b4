//! Stacking
//!
//! Aligns several grouped sources by key and lays them out as stacked (or
//! overlaid) layers. The chart's primary group is always the first layer;
//! [`StackMixin::stack`] appends more.
//!
//! Installing the mixin wraps the chart's group with a merging stage that
//! emits one [`LayeredRecord`] per distinct key, and replaces `data()` so it
//! produces one [`LayerSeries`] per visible layer.

use crate::chart::{
    Chart, ClickFilter, ColorAccessor, DataAccessor, DataFn, TitleFn, ValueAccessor,
};
use crate::data_types::{
    DataGroup, Datum, GroupedSource, Key, LayerSeries, LayeredRecord, LegendEntry, Measure,
    PointData, RawData, Record, StackedPoint,
};
use crate::error::Result;
use crate::layout::{StackLayout, StackOffset};
use crate::theme::Color;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub type LayerAccessor = dyn Fn(&Record) -> f64 + Send + Sync;

#[derive(Clone)]
pub enum LayerSource {
    /// Whatever group stage sits below the stacking stage.
    Primary,
    Group(Arc<dyn GroupedSource>),
}

#[derive(Clone)]
pub struct Layer {
    pub source: LayerSource,
    pub name: Option<String>,
    /// Replaces the chart's value accessor for this layer's records.
    pub accessor: Option<Arc<LayerAccessor>>,
    pub hidden: bool,
}

impl Layer {
    pub fn new(source: Arc<dyn GroupedSource>) -> Self {
        Self::from_source(LayerSource::Group(source))
    }

    fn from_source(source: LayerSource) -> Self {
        Self {
            source,
            name: None,
            accessor: None,
            hidden: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_accessor(mut self, accessor: impl Fn(&Record) -> f64 + Send + Sync + 'static) -> Self {
        self.accessor = Some(Arc::new(accessor));
        self
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match self.source {
            LayerSource::Primary => "primary",
            LayerSource::Group(_) => "group",
        };
        f.debug_struct("Layer")
            .field("source", &source)
            .field("name", &self.name)
            .field("accessor", &self.accessor.is_some())
            .field("hidden", &self.hidden)
            .finish()
    }
}

struct StackState {
    layers: Vec<Layer>,
    titles: HashMap<String, Arc<TitleFn>>,
    stacked: bool,
    full_stack_data: bool,
    stacked_color: bool,
    hidable_stacks: bool,
    layout: Arc<dyn StackLayout>,
}

impl StackState {
    fn layer_name(&self, i: usize) -> Option<String> {
        self.layers
            .get(i)
            .map(|l| l.name.clone().unwrap_or_else(|| i.to_string()))
    }

    fn visible(&self) -> Vec<usize> {
        self.layers
            .iter()
            .enumerate()
            .filter(|(_, l)| !l.hidden)
            .map(|(i, _)| i)
            .collect()
    }

    fn reset(&mut self, name: Option<&str>) {
        let mut primary = Layer::from_source(LayerSource::Primary);
        primary.name = name.map(str::to_string);
        self.layers = vec![primary];
        self.titles.clear();
    }

    fn indices_named(&self, name: &str) -> Vec<usize> {
        (0..self.layers.len())
            .filter(|&i| self.layer_name(i).as_deref() == Some(name))
            .collect()
    }

    fn set_hidden(&mut self, name: &str, hidden: bool) {
        let matches = self.indices_named(name);
        if matches.is_empty() {
            warn!(name, "no stack with this name");
        }
        for i in matches {
            self.layers[i].hidden = hidden;
        }
    }
}

struct StackGroup {
    inner: Arc<dyn DataGroup>,
    state: Arc<RwLock<StackState>>,
}

impl DataGroup for StackGroup {
    fn all(&self, chart: &Chart) -> Result<Vec<Datum>> {
        let layers: Vec<(usize, LayerSource)> = {
            let state = self.state.read();
            state
                .visible()
                .into_iter()
                .map(|i| (i, state.layers[i].source.clone()))
                .collect()
        };
        let width = layers.len();
        let key_of = chart.key_accessor()?;

        let mut merged: IndexMap<Key, Vec<Option<Datum>>> = IndexMap::new();
        for (slot, (_, source)) in layers.iter().enumerate() {
            let rows = match source {
                LayerSource::Primary => self.inner.all(chart)?,
                LayerSource::Group(group) => group.all().into_iter().map(Datum::Plain).collect(),
            };
            for row in rows {
                let values = merged
                    .entry(key_of(&row))
                    .or_insert_with(|| vec![None; width]);
                values[slot] = Some(row);
            }
        }
        trace!(layers = width, rows = merged.len(), "stack merged");

        let declared: Vec<usize> = layers.iter().map(|(i, _)| *i).collect();
        Ok(merged
            .into_iter()
            .map(|(key, values)| {
                Datum::Layered(LayeredRecord {
                    key,
                    values,
                    layers: declared.clone(),
                })
            })
            .collect())
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

/// Handle on the stacking behavior installed on a chart.
#[derive(Clone)]
pub struct StackMixin {
    state: Arc<RwLock<StackState>>,
}

impl StackMixin {
    pub fn install(chart: &mut Chart) -> Result<Self> {
        let mut state = StackState {
            layers: Vec::new(),
            titles: HashMap::new(),
            stacked: true,
            full_stack_data: false,
            stacked_color: true,
            hidable_stacks: false,
            layout: Arc::new(StackOffset::Zero),
        };
        if chart.has_group() {
            state.reset(chart.group_name());
        }
        let state = Arc::new(RwLock::new(state));

        let ops = chart.ops_mut();
        ops.group.ensure_installed()?;
        ops.key_accessor.ensure_installed()?;
        ops.value_accessor.ensure_installed()?;
        ops.data_accessor.ensure_installed()?;
        ops.client_data_accessor.ensure_installed()?;
        ops.color_accessor.ensure_installed()?;
        ops.data.ensure_installed()?;
        ops.click_filter.ensure_installed()?;

        let group_state = state.clone();
        ops.group
            .override_with(move |inner: Arc<dyn DataGroup>| -> Arc<dyn DataGroup> {
                Arc::new(StackGroup {
                    inner,
                    state: group_state.clone(),
                })
            })?;

        let value_state = state.clone();
        ops.value_accessor
            .override_with(move |inner: Arc<ValueAccessor>| -> Arc<ValueAccessor> {
                let state = value_state.clone();
                Arc::new(move |d: &Datum| match d {
                    Datum::Layered(row) => layered_measure(row, &state, &inner),
                    _ => inner(d),
                })
            })?;

        ops.data_accessor
            .override_with(|inner: Arc<DataAccessor>| -> Arc<DataAccessor> {
                Arc::new(move |d: &Datum| match d {
                    Datum::Layered(row) => slot_data(row, &inner),
                    _ => inner(d),
                })
            })?;

        let client_state = state.clone();
        ops.client_data_accessor
            .override_with(move |inner: Arc<DataAccessor>| -> Arc<DataAccessor> {
                let state = client_state.clone();
                Arc::new(move |d: &Datum| match d {
                    Datum::Layered(row) if state.read().full_stack_data => slot_data(row, &inner),
                    Datum::Layered(row) => match row.values.first() {
                        Some(Some(first)) => inner(first),
                        _ => RawData::Missing,
                    },
                    _ => inner(d),
                })
            })?;

        let color_state = state.clone();
        ops.color_accessor
            .override_with(move |inner: Arc<ColorAccessor>| -> Arc<ColorAccessor> {
                let state = color_state.clone();
                Arc::new(move |chart: &Chart, point: &PointData| -> Result<Key> {
                    let by_layer = state.read().stacked_color;
                    match (&point.layer, by_layer) {
                        (Some(layer), true) => Ok(Key::text(layer.as_str())),
                        _ => inner(chart, point),
                    }
                })
            })?;

        ops.click_filter
            .override_with(|inner: Arc<ClickFilter>| -> Arc<ClickFilter> {
                Arc::new(move |chart: &Chart, d: &Datum| match d {
                    Datum::Layered(row) => match row.first_present() {
                        Some(slot) => inner(chart, slot),
                        None => inner(chart, d),
                    },
                    _ => inner(chart, d),
                })
            })?;

        let data_state = state.clone();
        ops.data.override_with(move |_replaced: Arc<DataFn>| -> Arc<DataFn> {
            let state = data_state.clone();
            Arc::new(move |chart: &Chart| stack_data(chart, &state))
        })?;

        let hook_state = state.clone();
        chart.on_group_change(move |name| {
            debug!(?name, "group rebound, stack reset");
            hook_state.write().reset(name);
        });

        Ok(Self { state })
    }

    /// Declaring a second layer switches to coloring by layer name.
    pub fn stack(&self, layer: Layer) {
        let mut state = self.state.write();
        state.layers.push(layer);
        if state.layers.len() > 1 {
            state.stacked_color = true;
        }
    }

    pub fn layers(&self) -> Vec<Layer> {
        self.state.read().layers.clone()
    }

    pub fn hide_stack(&self, name: &str) {
        self.state.write().set_hidden(name, true);
    }

    pub fn show_stack(&self, name: &str) {
        self.state.write().set_hidden(name, false);
    }

    pub fn layer_name(&self, i: usize) -> Option<String> {
        self.state.read().layer_name(i)
    }

    pub fn layer_accessor(&self, i: usize) -> Option<Arc<LayerAccessor>> {
        self.state
            .read()
            .layers
            .get(i)
            .and_then(|l| l.accessor.clone())
    }

    pub fn stacked(&self) -> bool {
        self.state.read().stacked
    }

    pub fn set_stacked(&self, stacked: bool) {
        self.state.write().stacked = stacked;
    }

    pub fn full_stack_data(&self) -> bool {
        self.state.read().full_stack_data
    }

    pub fn set_full_stack_data(&self, full: bool) {
        self.state.write().full_stack_data = full;
    }

    pub fn hidable_stacks(&self) -> bool {
        self.state.read().hidable_stacks
    }

    pub fn set_hidable_stacks(&self, hidable: bool) {
        self.state.write().hidable_stacks = hidable;
    }

    pub fn stacked_color(&self) -> bool {
        self.state.read().stacked_color
    }

    pub fn set_stacked_color(&self, stacked_color: bool) {
        self.state.write().stacked_color = stacked_color;
    }

    pub fn set_stack_layout(&self, layout: impl StackLayout + 'static) {
        self.state.write().layout = Arc::new(layout);
    }

    pub fn set_stack_title(&self, name: impl Into<String>, title: impl Fn(&RawData) -> String + Send + Sync + 'static) {
        self.state.write().titles.insert(name.into(), Arc::new(title));
    }

    pub fn title_for(&self, chart: &Chart, name: &str) -> Arc<TitleFn> {
        self.state
            .read()
            .titles
            .get(name)
            .cloned()
            .unwrap_or_else(|| chart.title())
    }

    /// One entry per declared layer, hidden ones included. Without stacked
    /// coloring a layer shows the color of its first rendered point.
    pub fn legendables(&self, chart: &Chart) -> Vec<LegendEntry> {
        let (layers, by_name): (Vec<(String, bool)>, bool) = {
            let state = self.state.read();
            let layers = (0..state.layers.len())
                .filter_map(|i| Some((state.layer_name(i)?, state.layers[i].hidden)))
                .collect();
            (layers, state.stacked_color)
        };
        let rendered = if by_name {
            HashMap::new()
        } else {
            first_point_colors(chart)
        };

        layers
            .into_iter()
            .map(|(name, hidden)| {
                let key = Key::text(name.as_str());
                let color = match rendered.get(&name) {
                    Some(&color) => color,
                    None if by_name => chart.colors().color(&key),
                    None => chart.colors().peek(&key),
                };
                LegendEntry {
                    name,
                    hidden,
                    color,
                }
            })
            .collect()
    }

    pub fn is_legendable_hidden(&self, name: &str) -> bool {
        let state = self.state.read();
        state
            .indices_named(name)
            .first()
            .is_some_and(|&i| state.layers[i].hidden)
    }

    /// Flips the visibility of a named stack. Only effective with hidable
    /// stacks; returns whether anything changed.
    pub fn legend_toggle(&self, name: &str) -> bool {
        let mut state = self.state.write();
        if !state.hidable_stacks {
            return false;
        }
        let Some(hidden) = state.indices_named(name).first().map(|&i| state.layers[i].hidden) else {
            return false;
        };
        state.set_hidden(name, !hidden);
        true
    }
}

impl std::fmt::Debug for StackMixin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("StackMixin")
            .field("layers", &state.layers)
            .field("stacked", &state.stacked)
            .field("full_stack_data", &state.full_stack_data)
            .field("stacked_color", &state.stacked_color)
            .finish()
    }
}

fn layered_measure(
    row: &LayeredRecord,
    state: &RwLock<StackState>,
    shared: &Arc<ValueAccessor>,
) -> Measure {
    let accessors: Vec<Option<Arc<LayerAccessor>>> = {
        let state = state.read();
        row.layers
            .iter()
            .map(|&i| state.layers.get(i).and_then(|l| l.accessor.clone()))
            .collect()
    };
    let slots = row
        .values
        .iter()
        .zip(accessors)
        .map(|(slot, accessor)| {
            slot.as_ref().map(|d| match (d, accessor) {
                (Datum::Plain(r), Some(accessor)) => accessor(r),
                _ => shared(d).total(),
            })
        })
        .collect();
    Measure::Layered(slots)
}

fn slot_data(row: &LayeredRecord, inner: &Arc<DataAccessor>) -> RawData {
    RawData::Many(
        row.values
            .iter()
            .map(|slot| slot.as_ref().map_or(RawData::Missing, |d| inner(d)))
            .collect(),
    )
}

/// Colors of each series' first point, assigned in rendering order.
fn first_point_colors(chart: &Chart) -> HashMap<String, Color> {
    let mut colors = HashMap::new();
    let series = match chart.data() {
        Ok(series) => series,
        Err(err) => {
            warn!(%err, "legend colors unavailable");
            return colors;
        }
    };
    for layer in &series {
        for point in &layer.values {
            match chart.get_color(&point.data) {
                Ok(color) => {
                    colors.entry(layer.name.clone()).or_insert(color);
                }
                Err(err) => warn!(%err, layer = %layer.name, "point color unavailable"),
            }
        }
    }
    colors
}

/// Replacement for the chart's `data()`: one series per visible layer.
fn stack_data(chart: &Chart, state: &RwLock<StackState>) -> Result<Vec<LayerSeries>> {
    let (names, stacked, layout) = {
        let state = state.read();
        let names: Vec<String> = state
            .visible()
            .into_iter()
            .filter_map(|i| state.layer_name(i))
            .collect();
        (names, state.stacked, state.layout.clone())
    };
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let rows = chart.all()?;
    let key_of = chart.key_accessor()?;
    let value_of = chart.value_accessor()?;

    let mut series: Vec<LayerSeries> = names
        .iter()
        .map(|name| LayerSeries {
            name: name.clone(),
            values: Vec::new(),
        })
        .collect();
    for row in rows {
        let x = key_of(&row);
        let slots = value_of(&row).into_layers();
        for (layer, y) in series.iter_mut().zip(slots) {
            let Some(y) = y else { continue };
            layer.values.push(StackedPoint {
                x: x.clone(),
                y,
                y0: 0.0,
                data: PointData {
                    datum: row.clone(),
                    layer: Some(layer.name.clone()),
                },
            });
        }
    }

    layout.layout(&mut series, stacked);
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::VecGroup;

    #[test]
    fn test_unnamed_layers_use_declaration_index() {
        let mut chart = Chart::new();
        chart.set_group(Arc::new(VecGroup::from_pairs([("a", 1)])), None);
        let stack = StackMixin::install(&mut chart).unwrap();
        stack.stack(Layer::new(Arc::new(VecGroup::from_pairs([("a", 2)]))));
        stack.stack(Layer::new(Arc::new(VecGroup::from_pairs([("a", 3)]))).named("third"));

        assert_eq!(stack.layer_name(0).as_deref(), Some("0"));
        assert_eq!(stack.layer_name(1).as_deref(), Some("1"));
        assert_eq!(stack.layer_name(2).as_deref(), Some("third"));
        assert_eq!(stack.layer_name(3), None);

        stack.hide_stack("1");
        assert!(stack.is_legendable_hidden("1"));
        assert!(!stack.is_legendable_hidden("0"));
        let names: Vec<String> = chart.data().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["0", "third"]);
    }

    #[test]
    fn test_rebinding_group_resets_layers() {
        let mut chart = Chart::new();
        let stack = StackMixin::install(&mut chart).unwrap();
        assert!(stack.layers().is_empty());

        chart.set_group(Arc::new(VecGroup::from_pairs([("a", 1)])), Some("first"));
        stack.stack(Layer::new(Arc::new(VecGroup::from_pairs([("a", 2)]))));
        assert_eq!(stack.layers().len(), 2);

        chart.set_group(Arc::new(VecGroup::from_pairs([("b", 1)])), Some("second"));
        assert_eq!(stack.layers().len(), 1);
        assert_eq!(stack.layer_name(0).as_deref(), Some("second"));
    }

    #[test]
    fn test_layer_accessor_overrides_shared_value() {
        let mut chart = Chart::new();
        chart.set_group(Arc::new(VecGroup::from_pairs([("a", 4)])), None);
        let stack = StackMixin::install(&mut chart).unwrap();
        stack.stack(
            Layer::new(Arc::new(VecGroup::from_pairs([("a", 4)])))
                .with_accessor(|r: &Record| r.number().unwrap_or(0.0) * 10.0),
        );

        let rows = chart.all().unwrap();
        let value = chart.value_accessor().unwrap()(&rows[0]);
        assert_eq!(value, Measure::Layered(vec![Some(4.0), Some(40.0)]));
        assert!(stack.layer_accessor(0).is_none());
        assert!(stack.layer_accessor(1).is_some());
    }
}
