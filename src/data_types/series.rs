use super::key::Key;
use super::record::Datum;
use crate::theme::Color;
use serde::{Deserialize, Serialize};

/// Data attached to a rendered point: the row it came from and, for
/// stacked output, the name of its layer.
#[derive(Clone, Debug, PartialEq)]
pub struct PointData {
    pub datum: Datum,
    pub layer: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StackedPoint {
    pub x: Key,
    /// This layer's own magnitude.
    pub y: f64,
    /// Baseline accumulated from the layers below.
    pub y0: f64,
    pub data: PointData,
}

impl StackedPoint {
    pub fn top(&self) -> f64 {
        self.y + self.y0
    }

    /// Lower edge, which is the top for negative magnitudes.
    pub fn low(&self) -> f64 {
        self.top().min(self.y0)
    }
}

/// One renderable series.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct LayerSeries {
    pub name: String,
    pub values: Vec<StackedPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub name: String,
    pub hidden: bool,
    pub color: Color,
}

/// Selection produced by clicking a rendered element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    Key(Key),
    /// Matches any of the keys; used for folded "others" entries.
    AnyOf(Vec<Key>),
}

impl Filter {
    pub fn matches(&self, key: &Key) -> bool {
        match self {
            Self::Key(k) => k == key,
            Self::AnyOf(keys) => keys.contains(key),
        }
    }
}
