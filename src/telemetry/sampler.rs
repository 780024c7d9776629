//! Per-port sampling passes.
//!
//! A pass issues one command per port and either returns a complete `Sample`
//! or fails as a whole. Partial results are never returned, so rates are never
//! computed against a mix of stale and fresh counters.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use super::session::Session;
use super::PortId;
use crate::error::{Result, TelemetryError};

/// Per-port ethdev counters.
pub const STATS_COMMAND: &str = "/ethdev/stats";

/// Per-port device information (name, MAC, MTU, ...).
pub const INFO_COMMAND: &str = "/ethdev/info";

/// Values reported for one port at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StatSet(BTreeMap<String, Value>);

impl StatSet {
    /// Builds a stat set from a command payload, which must be a JSON object.
    pub fn from_value(command: &str, value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(StatSet(map.into_iter().collect())),
            other => Err(TelemetryError::protocol(
                command,
                format!("expected a JSON object, got {other}"),
            )),
        }
    }

    /// Unsigned counter value, if present and integral.
    pub fn counter(&self, name: &str) -> Option<u64> {
        self.0.get(name).and_then(Value::as_u64)
    }

    /// Numeric value as float, if present and numeric.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Scalar numeric entries, in name order. Arrays and strings are skipped.
    pub fn numbers(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.0
            .iter()
            .filter_map(|(name, value)| value.as_f64().map(|v| (name.as_str(), v)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for StatSet {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        StatSet(
            iter.into_iter()
                .map(|(name, value)| (name.into(), Value::from(value)))
                .collect(),
        )
    }
}

/// One complete pass over all ports.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Command path the pass was issued with.
    pub command: String,
    /// Wall-clock capture time, for display.
    pub taken_at: DateTime<Utc>,
    /// Monotonic capture time, for interval measurement.
    pub captured: Instant,
    ports: Vec<(PortId, StatSet)>,
}

impl Sample {
    pub fn new(command: impl Into<String>, ports: Vec<(PortId, StatSet)>) -> Self {
        Self {
            command: command.into(),
            taken_at: Utc::now(),
            captured: Instant::now(),
            ports,
        }
    }

    pub fn with_captured(mut self, captured: Instant) -> Self {
        self.captured = captured;
        self
    }

    pub fn get(&self, port: PortId) -> Option<&StatSet> {
        self.ports
            .iter()
            .find(|(id, _)| *id == port)
            .map(|(_, stats)| stats)
    }

    /// Ports in enumeration order.
    pub fn ports(&self) -> impl Iterator<Item = PortId> + '_ {
        self.ports.iter().map(|(id, _)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PortId, &StatSet)> + '_ {
        self.ports.iter().map(|(id, stats)| (*id, stats))
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Seconds elapsed between `earlier` and this sample.
    pub fn seconds_since(&self, earlier: &Sample) -> f64 {
        self.captured
            .saturating_duration_since(earlier.captured)
            .as_secs_f64()
    }
}

/// Serializes as `{"<port>": {stats...}, ...}` in enumeration order.
impl Serialize for Sample {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.ports.len()))?;
        for (port, stats) in &self.ports {
            map.serialize_entry(port, stats)?;
        }
        map.end()
    }
}

/// Issues `<command>,<port>` for every port and collects the results.
///
/// Fails with `PartialSample` as soon as one port fails; nothing collected so
/// far is returned.
pub async fn sample_all(session: &mut Session, command: &str, ports: &[PortId]) -> Result<Sample> {
    let mut collected = Vec::with_capacity(ports.len());

    for &port in ports {
        let request = format!("{command},{port}");
        let stats = match session.command(&request).await {
            Ok(value) => StatSet::from_value(&request, value),
            Err(e) => Err(e),
        }
        .map_err(|e| TelemetryError::PartialSample {
            command: command.to_string(),
            port,
            source: Box::new(e),
        })?;
        collected.push((port, stats));
    }

    debug!(command = %command, ports = collected.len(), "Sampling pass completed");
    Ok(Sample::new(command, collected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stat_set_accessors() {
        let stats = StatSet::from_value(
            "/ethdev/stats,0",
            json!({"ipackets": 100, "q_ipackets": [1, 2], "mac_addr": "aa:bb", "ratio": 0.5}),
        )
        .unwrap();
        assert_eq!(stats.counter("ipackets"), Some(100));
        assert_eq!(stats.counter("ratio"), None);
        assert_eq!(stats.number("ratio"), Some(0.5));
        assert_eq!(stats.counter("missing"), None);

        let numbers: Vec<_> = stats.numbers().collect();
        assert_eq!(numbers, vec![("ipackets", 100.0), ("ratio", 0.5)]);
    }

    #[test]
    fn test_stat_set_rejects_non_object() {
        let err = StatSet::from_value("/ethdev/stats,0", json!([1, 2])).unwrap_err();
        assert_eq!(err.kind(), "protocol");
    }

    #[test]
    fn test_sample_serializes_in_port_order() {
        let sample = Sample::new(
            STATS_COMMAND,
            vec![
                (2, [("ipackets", 5u64)].into_iter().collect()),
                (0, [("ipackets", 7u64)].into_iter().collect()),
            ],
        );
        let text = serde_json::to_string(&sample).unwrap();
        assert_eq!(text, r#"{"2":{"ipackets":5},"0":{"ipackets":7}}"#);
        assert_eq!(sample.ports().collect::<Vec<_>>(), vec![2, 0]);
        assert_eq!(sample.get(0).and_then(|s| s.counter("ipackets")), Some(7));
        assert!(sample.get(1).is_none());
    }
}
