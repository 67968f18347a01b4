use super::key::Key;
use serde::{Deserialize, Serialize};

/// Application-defined aggregate value (commonly a number or a small object).
pub type Value = serde_json::Value;

/// One `{key, value}` aggregate as produced by a grouped data source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: Key,
    pub value: Value,
}

impl Record {
    pub fn new(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The value as a plain number, if it is one.
    pub fn number(&self) -> Option<f64> {
        self.value.as_f64()
    }
}

/// Result of a value accessor.
#[derive(Clone, Debug, PartialEq)]
pub enum Measure {
    Scalar(f64),
    /// One slot per visible layer, `None` where the layer has no entry.
    Layered(Vec<Option<f64>>),
}

impl Default for Measure {
    fn default() -> Self {
        Self::Scalar(0.0)
    }
}

impl Measure {
    /// Sum over all present layers.
    pub fn total(&self) -> f64 {
        match self {
            Self::Scalar(v) => *v,
            Self::Layered(values) => values.iter().flatten().sum(),
        }
    }

    pub fn into_layers(self) -> Vec<Option<f64>> {
        match self {
            Self::Scalar(v) => vec![Some(v)],
            Self::Layered(values) => values,
        }
    }

    /// Adds two measures. Layered measures add slot by slot; a missing slot
    /// stays missing only when both sides lack it.
    pub fn combine(self, other: Measure) -> Measure {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => Self::Scalar(a + b),
            (a, b) => {
                let (a, b) = (a.into_layers(), b.into_layers());
                let len = a.len().max(b.len());
                let slots = (0..len)
                    .map(|i| {
                        match (a.get(i).copied().flatten(), b.get(i).copied().flatten()) {
                            (Some(x), Some(y)) => Some(x + y),
                            (x, y) => x.or(y),
                        }
                    })
                    .collect();
                Self::Layered(slots)
            }
        }
    }
}

/// Synthetic entry folding every record that fell outside the cap.
#[derive(Clone, Debug, PartialEq)]
pub struct OthersRecord {
    pub key: Key,
    pub value: Measure,
    /// Keys of the absorbed records, in source order. Never empty.
    pub members: Vec<Key>,
    pub absorbed: Vec<Datum>,
}

/// One row of the stacking merge: the entries of every visible layer that
/// share a key.
#[derive(Clone, Debug, PartialEq)]
pub struct LayeredRecord {
    pub key: Key,
    /// Aligned with the visible layers, `None` where a layer lacks the key.
    pub values: Vec<Option<Datum>>,
    /// Declaration index of the layer behind each slot.
    pub layers: Vec<usize>,
}

impl LayeredRecord {
    pub fn first_present(&self) -> Option<&Datum> {
        self.values.iter().flatten().next()
    }
}

/// Any element flowing through the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum Datum {
    Plain(Record),
    Others(OthersRecord),
    Layered(LayeredRecord),
}

impl Datum {
    /// The key stored on the element itself, before any key accessor runs.
    pub fn key(&self) -> &Key {
        match self {
            Self::Plain(r) => &r.key,
            Self::Others(o) => &o.key,
            Self::Layered(l) => &l.key,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Plain(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_others(&self) -> Option<&OthersRecord> {
        match self {
            Self::Others(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_layered(&self) -> Option<&LayeredRecord> {
        match self {
            Self::Layered(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_others(&self) -> bool {
        matches!(self, Self::Others(_))
    }
}

impl From<Record> for Datum {
    fn from(r: Record) -> Self {
        Self::Plain(r)
    }
}

/// Original data behind a rendered element, as handed to titles and
/// ordering functions.
#[derive(Clone, Debug, PartialEq)]
pub enum RawData {
    Record(Record),
    Many(Vec<RawData>),
    Missing,
}

impl RawData {
    /// Every record reachable from this value, depth first.
    pub fn records(&self) -> Vec<&Record> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into<'a>(&'a self, out: &mut Vec<&'a Record>) {
        match self {
            Self::Record(r) => out.push(r),
            Self::Many(items) => items.iter().for_each(|i| i.collect_into(out)),
            Self::Missing => {}
        }
    }
}
