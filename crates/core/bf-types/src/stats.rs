//! Mergeable statistics map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Mapping from metric name to value.
///
/// Numeric values are accumulated by [`StatsMap::merge`]; any other value
/// is replaced by the most recently merged one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsMap(Map<String, Value>);

impl StatsMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a metric.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Gets a metric as an integer, if it is one.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// Gets a metric as a float, if it is numeric.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    /// Sets a metric, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Adds `amount` to an integer counter, creating it at zero.
    pub fn increment(&mut self, key: &str, amount: i64) {
        let current = self.get_i64(key).unwrap_or(0);
        self.0
            .insert(key.to_string(), Value::from(current.saturating_add(amount)));
    }

    /// Number of metrics.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map holds no metrics.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates metrics in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Borrows the underlying JSON map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes into the underlying JSON map.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Merges `other` into `self`.
    ///
    /// Numbers present on both sides are summed (integers stay integers
    /// unless the sum overflows or either side is a float). Everything else
    /// is overwritten by `other`.
    pub fn merge(&mut self, other: &StatsMap) {
        for (key, value) in other.iter() {
            let merged = match (self.0.get(key), value) {
                (Some(Value::Number(a)), Value::Number(b)) => add_numbers(a, b),
                _ => value.clone(),
            };
            self.0.insert(key.clone(), merged);
        }
    }

    /// Computes what changed between `previous` and `self`.
    ///
    /// Numeric metrics become the difference from the earlier snapshot;
    /// non-numeric metrics are carried as their current value. Merging the
    /// deltas of successive cumulative snapshots reproduces the final
    /// snapshot exactly once.
    pub fn delta_since(&self, previous: &StatsMap) -> StatsMap {
        let mut delta = StatsMap::new();
        for (key, value) in self.iter() {
            let changed = match (value, previous.0.get(key)) {
                (Value::Number(now), Some(Value::Number(before))) => sub_numbers(now, before),
                _ => value.clone(),
            };
            delta.0.insert(key.clone(), changed);
        }
        delta
    }
}

impl From<Map<String, Value>> for StatsMap {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn add_numbers(a: &Number, b: &Number) -> Value {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Value::from(sum);
        }
    }
    float_value(a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0))
}

fn sub_numbers(a: &Number, b: &Number) -> Value {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(diff) = x.checked_sub(y) {
            return Value::from(diff);
        }
    }
    float_value(a.as_f64().unwrap_or(0.0) - b.as_f64().unwrap_or(0.0))
}

// NaN and infinities have no JSON representation
fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}
