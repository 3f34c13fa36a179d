//! The metric registry: current predicted value per subscribed metric.

use crate::value::MetricValue;
use std::collections::{BTreeMap, HashMap};

/// Effect of applying an authoritative metric-name list to the registry.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MetricListDelta {
    /// Names newly added; each needs a value-topic subscription.
    pub added: Vec<String>,
    /// Names removed; each needs its subscription cancelled.
    pub removed: Vec<String>,
}

/// Current predicted value per metric, with a zero-order hold.
///
/// A record is null until its first observation. Predictions may target
/// different future time points; the registry keeps the largest observed
/// prediction time as the validity time of the whole snapshot.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    records: HashMap<String, Option<MetricValue>>,
    validity: u64,
    all_values_set: bool,
}

impl MetricRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconciles the registry against the authoritative metric-name list.
    ///
    /// Added names start null; removed names drop their record. Whenever a
    /// record is added the all-values-set flag resets, forcing a fresh scan
    /// before the next trigger is honoured.
    pub fn apply_metric_list(&mut self, names: &[String]) -> MetricListDelta {
        let mut delta = MetricListDelta::default();

        for name in names {
            if !self.records.contains_key(name) {
                self.records.insert(name.clone(), None);
                delta.added.push(name.clone());
            }
        }

        let keep: std::collections::HashSet<&String> = names.iter().collect();
        let stale: Vec<String> = self
            .records
            .keys()
            .filter(|name| !keep.contains(name))
            .cloned()
            .collect();
        for name in stale {
            self.records.remove(&name);
            delta.removed.push(name);
        }

        if !delta.added.is_empty() {
            self.all_values_set = false;
        }

        delta.added.sort();
        delta.removed.sort();
        delta
    }

    /// Stores a new prediction for a metric.
    ///
    /// Returns false when the metric is unknown, in which case the update is
    /// dropped by the caller. The snapshot validity advances to the largest
    /// prediction time seen.
    pub fn record_value(&mut self, name: &str, value: MetricValue, prediction_time: u64) -> bool {
        match self.records.get_mut(name) {
            Some(record) => {
                *record = Some(value);
                self.validity = self.validity.max(prediction_time);
                true
            }
            None => false,
        }
    }

    /// True when every record holds a value.
    ///
    /// The flag latches: once a full scan finds no null record, later calls
    /// skip the scan until the metric list changes. The flag may lag behind
    /// reality in the false direction, never in the true direction.
    pub fn is_complete(&mut self) -> bool {
        if self.all_values_set {
            return true;
        }
        if self.records.is_empty() {
            return false;
        }
        if self.records.values().all(Option::is_some) {
            self.all_values_set = true;
        }
        self.all_values_set
    }

    /// Copy of all non-null records.
    pub fn snapshot(&self) -> BTreeMap<String, MetricValue> {
        self.records
            .iter()
            .filter_map(|(name, record)| {
                record.as_ref().map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }

    /// Validity time of the snapshot: the largest prediction time observed.
    pub fn validity(&self) -> u64 {
        self.validity
    }

    /// True when no metrics are registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of registered metrics.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the metric is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }
}
