use chart_layers::cap::{Cap, CapMixin};
use chart_layers::data_types::{Filter, Key, LayerSeries, Measure, VecGroup};
use chart_layers::stack::{Layer, StackMixin};
use chart_layers::{Chart, ChartError, RowChart};
use std::sync::Arc;

fn abcd() -> Arc<VecGroup> {
    Arc::new(VecGroup::from_pairs([("A", 10), ("B", 7), ("C", 5), ("D", 1)]))
}

fn points(series: &[LayerSeries]) -> Vec<(String, Key, f64, f64)> {
    series
        .iter()
        .flat_map(|s| s.values.iter().map(|p| (s.name.clone(), p.x.clone(), p.y, p.y0)))
        .collect()
}

/// Stacking installed over capping: the cap only shapes the primary layer.
fn stack_over_cap() -> (Chart, CapMixin, StackMixin) {
    let mut chart = Chart::new();
    chart.set_group(abcd(), None);
    let cap = CapMixin::install(&mut chart).unwrap();
    let stack = StackMixin::install(&mut chart).unwrap();
    (chart, cap, stack)
}

#[test]
fn test_both_orders_agree_on_a_single_layer() {
    let mut row = RowChart::new().unwrap();
    row.set_group(abcd(), None).set_rows_cap(Cap::Limit(2));

    let (chart, cap, _stack) = stack_over_cap();
    cap.set_cap(Cap::Limit(2));

    let expected = vec![
        ("0".to_string(), Key::from("A"), 10.0, 0.0),
        ("0".to_string(), Key::from("B"), 7.0, 0.0),
        ("0".to_string(), Key::from("Others"), 6.0, 0.0),
    ];
    assert_eq!(points(&row.data().unwrap()), expected);
    assert_eq!(points(&chart.data().unwrap()), expected);
}

#[test]
fn test_others_click_in_either_order() {
    let mut row = RowChart::new().unwrap();
    row.set_group(abcd(), None).set_rows_cap(Cap::Limit(2));
    let series = row.data().unwrap();
    let others = series[0].values[2].data.datum.clone();
    assert_eq!(
        row.on_click(&others).unwrap(),
        Filter::AnyOf(vec![Key::from("C"), Key::from("D")])
    );

    let (mut chart, cap, _stack) = stack_over_cap();
    cap.set_cap(Cap::Limit(2));
    let series = chart.data().unwrap();
    let others = series[0].values[2].data.datum.clone();
    assert_eq!(
        chart.on_click(&others).unwrap(),
        Filter::AnyOf(vec![Key::from("C"), Key::from("D")])
    );
}

#[test]
fn test_capped_stack_sums_others_per_layer() {
    let mut row = RowChart::new().unwrap();
    row.set_group(abcd(), Some("first"))
        .stack_layer(
            Layer::new(Arc::new(VecGroup::from_pairs([("A", 1), ("C", 2), ("D", 3)]))).named("second"),
        )
        .set_rows_cap(Cap::Limit(1));

    let rows = row.chart().all().unwrap();
    assert_eq!(rows.len(), 2);
    let others = rows[1].as_others().unwrap();
    assert_eq!(others.members, vec![Key::from("B"), Key::from("C"), Key::from("D")]);
    assert_eq!(others.value, Measure::Layered(vec![Some(13.0), Some(5.0)]));

    let series = row.data().unwrap();
    assert_eq!(
        points(&series),
        vec![
            ("first".to_string(), Key::from("A"), 10.0, 0.0),
            ("first".to_string(), Key::from("Others"), 13.0, 0.0),
            ("second".to_string(), Key::from("A"), 1.0, 10.0),
            ("second".to_string(), Key::from("Others"), 5.0, 13.0),
        ]
    );
}

#[test]
fn test_capped_primary_layer_under_stack() {
    let (chart, cap, stack) = stack_over_cap();
    cap.set_cap(Cap::Limit(1));
    stack.stack(Layer::new(Arc::new(VecGroup::from_pairs([("B", 4)]))).named("extra"));

    let series = chart.data().unwrap();
    assert_eq!(
        points(&series),
        vec![
            ("0".to_string(), Key::from("A"), 10.0, 0.0),
            ("0".to_string(), Key::from("Others"), 13.0, 0.0),
            ("extra".to_string(), Key::from("B"), 4.0, 0.0),
        ]
    );
}

#[test]
fn test_missing_operation_on_bare_chart() {
    let mut chart = Chart::bare();
    assert_eq!(
        CapMixin::install(&mut chart).unwrap_err(),
        ChartError::MissingOperation("group")
    );
    assert_eq!(
        StackMixin::install(&mut chart).unwrap_err(),
        ChartError::MissingOperation("group")
    );
    assert_eq!(chart.data().unwrap_err(), ChartError::MissingOperation("data"));
}

#[test]
fn test_base_reinstall_keeps_mixins() {
    let mut row = RowChart::new().unwrap();
    row.set_group(abcd(), None).set_rows_cap(Cap::Limit(2));
    row.chart_mut().install_base();

    let series = row.data().unwrap();
    assert_eq!(series[0].values.len(), 3);
    assert_eq!(series[0].values[2].x, Key::from("Others"));
}
