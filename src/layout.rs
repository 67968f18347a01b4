//! Stack layouts: assign each point its baseline (`y0`) from the layers
//! below it.

use crate::data_types::{Key, LayerSeries};
use std::collections::HashMap;

/// Pluggable layout run over the per-layer series, bottom layer first.
pub trait StackLayout: Send + Sync {
    /// With `stacked == false` every baseline stays at zero.
    fn layout(&self, layers: &mut [LayerSeries], stacked: bool);
}

/// Offset algorithms for stacking
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StackOffset {
    /// Cumulative sum from a zero baseline
    #[default]
    Zero,
    /// Each key's stack scaled to a total of 1
    Expand,
}

impl StackLayout for StackOffset {
    fn layout(&self, layers: &mut [LayerSeries], stacked: bool) {
        if *self == StackOffset::Expand {
            normalize(layers);
        }

        if !stacked {
            layers
                .iter_mut()
                .flat_map(|l| l.values.iter_mut())
                .for_each(|p| p.y0 = 0.0);
            return;
        }

        // layers missing a key simply add nothing to its running sum
        let mut running: HashMap<Key, f64> = HashMap::new();
        for layer in layers.iter_mut() {
            for point in layer.values.iter_mut() {
                let base = running.entry(point.x.clone()).or_insert(0.0);
                point.y0 = *base;
                *base += point.y;
            }
        }
    }
}

fn normalize(layers: &mut [LayerSeries]) {
    let mut totals: HashMap<Key, f64> = HashMap::new();
    for point in layers.iter().flat_map(|l| l.values.iter()) {
        *totals.entry(point.x.clone()).or_insert(0.0) += point.y;
    }
    for point in layers.iter_mut().flat_map(|l| l.values.iter_mut()) {
        let total = totals.get(&point.x).copied().unwrap_or(0.0);
        point.y = if total == 0.0 { 0.0 } else { point.y / total };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::{Datum, PointData, Record, StackedPoint};

    fn point(x: i64, y: f64) -> StackedPoint {
        StackedPoint {
            x: Key::from(x),
            y,
            y0: -1.0,
            data: PointData {
                datum: Datum::Plain(Record::new(x, y)),
                layer: None,
            },
        }
    }

    fn series(name: &str, values: Vec<StackedPoint>) -> LayerSeries {
        LayerSeries {
            name: name.to_string(),
            values,
        }
    }

    #[test]
    fn test_zero_baseline_skips_missing_keys() {
        let mut layers = vec![
            series("a", vec![point(1, 5.0)]),
            series("b", vec![point(1, 3.0), point(2, 4.0)]),
            series("c", vec![point(2, 1.0)]),
        ];
        StackOffset::Zero.layout(&mut layers, true);

        assert_eq!(layers[0].values[0].y0, 0.0);
        assert_eq!(layers[1].values[0].y0, 5.0);
        assert_eq!(layers[1].values[1].y0, 0.0);
        assert_eq!(layers[2].values[0].y0, 4.0);
        assert_eq!(layers[2].values[0].top(), 5.0);
    }

    #[test]
    fn test_overlay_resets_baselines() {
        let mut layers = vec![
            series("a", vec![point(1, 5.0)]),
            series("b", vec![point(1, 3.0)]),
        ];
        StackOffset::Zero.layout(&mut layers, false);
        assert!(layers.iter().flat_map(|l| &l.values).all(|p| p.y0 == 0.0));
    }

    #[test]
    fn test_expand_normalizes_each_key() {
        let mut layers = vec![
            series("a", vec![point(1, 1.0), point(2, 0.0)]),
            series("b", vec![point(1, 3.0), point(2, 0.0)]),
        ];
        StackOffset::Expand.layout(&mut layers, true);

        assert_eq!(layers[0].values[0].y, 0.25);
        assert_eq!(layers[1].values[0].y0, 0.25);
        assert_eq!(layers[1].values[0].top(), 1.0);
        assert_eq!(layers[1].values[1].y, 0.0);
    }
}
