use crate::cap::{Cap, CapMixin};
use crate::chart::Chart;
use crate::data_types::{Datum, Filter, GroupedSource, LayerSeries, LegendEntry, PipelineConfig};
use crate::error::Result;
use crate::stack::{Layer, StackMixin};
use std::sync::Arc;
use tracing::{debug, info};

/// Row chart model: stacking over the base chart, capping outermost, and a
/// single color range by default.
#[derive(Debug)]
pub struct RowChart {
    chart: Chart,
    stack: StackMixin,
    cap: CapMixin,
}

impl RowChart {
    pub fn new() -> Result<Self> {
        let mut chart = Chart::new();
        let stack = StackMixin::install(&mut chart)?;
        let cap = CapMixin::install(&mut chart)?;
        stack.set_stacked_color(false);
        Ok(Self { chart, stack, cap })
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    pub fn chart_mut(&mut self) -> &mut Chart {
        &mut self.chart
    }

    pub fn stack(&self) -> &StackMixin {
        &self.stack
    }

    pub fn cap(&self) -> &CapMixin {
        &self.cap
    }

    pub fn set_group(&mut self, source: Arc<dyn GroupedSource>, name: Option<&str>) -> &mut Self {
        self.chart.set_group(source, name);
        self
    }

    pub fn stack_layer(&mut self, layer: Layer) -> &mut Self {
        self.stack.stack(layer);
        self
    }

    /// Number of rows drawn before folding the rest into the others row.
    pub fn rows_cap(&self) -> Cap {
        self.cap.cap()
    }

    pub fn set_rows_cap(&mut self, cap: Cap) -> &mut Self {
        self.cap.set_cap(cap);
        self
    }

    pub fn set_others_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.cap.set_others_label(label);
        self
    }

    pub fn set_stacked(&mut self, stacked: bool) -> &mut Self {
        self.stack.set_stacked(stacked);
        self
    }

    pub fn data(&self) -> Result<Vec<LayerSeries>> {
        self.chart.data()
    }

    pub fn legendables(&self) -> Vec<LegendEntry> {
        self.stack.legendables(&self.chart)
    }

    pub fn on_click(&mut self, datum: &Datum) -> Result<Filter> {
        let filter = self.chart.on_click(datum)?;
        debug!(?filter, "row clicked");
        Ok(filter)
    }

    /// Applies every setting of `config`. Stacks listed as hidden must
    /// already be declared.
    pub fn apply_config(&mut self, config: &PipelineConfig) -> Result<&mut Self> {
        config.validate()?;
        self.cap.set_cap(config.cap()?);
        self.cap.set_others_label(config.others_label.as_str());
        self.stack.set_stacked(config.stacked);
        self.stack.set_full_stack_data(config.full_stack_data);
        self.stack.set_hidable_stacks(config.hidable_stacks);
        if let Some(stacked_color) = config.stacked_color {
            self.stack.set_stacked_color(stacked_color);
        }
        self.chart.set_y_axis_padding(config.y_axis_padding)?;
        for name in &config.hidden_stacks {
            self.stack.hide_stack(name);
        }
        info!(cap = ?config.cap, stacked = config.stacked, "row chart configured");
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::VecGroup;

    #[test]
    fn test_defaults_to_single_color_range() {
        let mut row = RowChart::new().unwrap();
        row.set_group(Arc::new(VecGroup::from_pairs([("a", 2), ("b", 1)])), None);
        assert!(!row.stack().stacked_color());
        assert_eq!(row.rows_cap(), Cap::Unbounded);

        let series = row.data().unwrap();
        let point = &series[0].values[1].data;
        let color_key = row.chart().color_accessor().unwrap()(row.chart(), point).unwrap();
        assert_eq!(color_key, crate::data_types::Key::from("b"));
    }

    #[test]
    fn test_apply_config_sets_cap_and_label() {
        let mut row = RowChart::new().unwrap();
        let config = PipelineConfig::from_json(r#"{ "cap": 1, "others_label": "Rest" }"#).unwrap();
        row.apply_config(&config).unwrap();
        assert_eq!(row.rows_cap(), Cap::Limit(1));
        assert_eq!(row.cap().others_label(), "Rest");
    }
}
