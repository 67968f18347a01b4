use chart_layers::cap::Cap;
use chart_layers::data_types::{Key, Record, VecGroup};
use chart_layers::stack::Layer;
use chart_layers::RowChart;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

fn random_group(rng: &mut StdRng, max_keys: usize) -> (VecGroup, HashMap<Key, i64>) {
    let n = rng.random_range(0..=max_keys);
    let mut values = HashMap::new();
    let mut records = Vec::new();
    for i in 0..n {
        if !rng.random_bool(0.8) {
            continue;
        }
        let v: i64 = rng.random_range(0..50);
        values.insert(Key::from(i), v);
        records.push(Record::new(i, v));
    }
    (VecGroup::new(records), values)
}

#[test]
fn test_cap_partitions_every_key() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let (group, values) = random_group(&mut rng, 30);
        let cap = rng.random_range(0..12usize);
        let mut row = RowChart::new().unwrap();
        row.set_group(Arc::new(group), None).set_rows_cap(Cap::Limit(cap));

        let rows = row.chart().all().unwrap();
        let kept: Vec<&Key> = rows.iter().filter(|d| !d.is_others()).map(|d| d.key()).collect();
        assert_eq!(kept.len(), cap.min(values.len()));

        let members: Vec<Key> = rows
            .iter()
            .filter_map(|d| d.as_others())
            .flat_map(|o| o.members.clone())
            .collect();
        assert_eq!(members.is_empty(), values.len() <= cap);

        let mut seen: HashSet<Key> = kept.into_iter().cloned().collect();
        for m in &members {
            assert!(seen.insert(m.clone()), "{m} counted twice");
        }
        assert_eq!(seen.len(), values.len());

        // the others row sums exactly what it absorbed
        if let Some(others) = rows.iter().find_map(|d| d.as_others()) {
            let expected: i64 = others.members.iter().map(|k| values[k]).sum();
            assert_eq!(others.value.total(), expected as f64);
        }
    }
}

#[test]
fn test_top_layer_reaches_the_key_total() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..100 {
        let layers = rng.random_range(1..5usize);
        let mut totals: HashMap<Key, f64> = HashMap::new();
        let mut row = RowChart::new().unwrap();
        for i in 0..layers {
            let (group, values) = random_group(&mut rng, 15);
            for (k, v) in values {
                *totals.entry(k).or_insert(0.0) += v as f64;
            }
            if i == 0 {
                row.set_group(Arc::new(group), Some("0"));
            } else {
                row.stack_layer(Layer::new(Arc::new(group)).named(i.to_string()));
            }
        }

        let series = row.data().unwrap();
        let mut tops: HashMap<Key, f64> = HashMap::new();
        for point in series.iter().flat_map(|s| &s.values) {
            assert!(point.y0 >= 0.0);
            let top = tops.entry(point.x.clone()).or_insert(0.0);
            *top = top.max(point.top());
        }
        assert_eq!(tops, totals);
    }
}

#[test]
fn test_repeated_queries_are_identical() {
    let mut rng = StdRng::seed_from_u64(3);
    let (group, _) = random_group(&mut rng, 40);
    let (extra, _) = random_group(&mut rng, 40);
    let mut row = RowChart::new().unwrap();
    row.set_group(Arc::new(group), Some("a"))
        .stack_layer(Layer::new(Arc::new(extra)).named("b"))
        .set_rows_cap(Cap::Limit(5));

    assert_eq!(row.data().unwrap(), row.data().unwrap());
    assert_eq!(row.chart().all().unwrap(), row.chart().all().unwrap());
}
