//! chart_layers: capping and stacking pipeline for grouped chart data

pub mod cap;
pub mod chart;
pub mod data_types;
pub mod error;
pub mod layout;
pub mod override_chain;
#[cfg(feature = "polars")]
pub mod polars_source;
pub mod row_chart;
pub mod stack;
pub mod theme;

pub use cap::{Cap, CapMixin};
pub use chart::Chart;
pub use data_types::{Datum, Filter, GroupedSource, Key, LayerSeries, Record, VecGroup};
pub use error::{ChartError, Result};
pub use layout::{StackLayout, StackOffset};
pub use row_chart::RowChart;
pub use stack::{Layer, StackMixin};
pub use theme::{Color, ColorScale, OrdinalColors};
