//! Packet rates derived from two consecutive samples.
//!
//! Counters are unsigned and monotonic on the device side. A decrease means
//! the device was reset or the counter wrapped; the resulting negative rate is
//! reported as-is and the entry is flagged with `counter_reset`, so monitoring
//! sees the reset instead of a silently clamped zero.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use super::sampler::{Sample, StatSet};
use super::PortId;

pub const RX_COUNTER: &str = "ipackets";
pub const DROP_COUNTER: &str = "imissed";
pub const TX_COUNTER: &str = "opackets";
pub const RX_BYTES_COUNTER: &str = "ibytes";
pub const TX_BYTES_COUNTER: &str = "obytes";

/// Per-second rates for one port.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortRates {
    /// Received packets per second.
    pub rx: f64,
    /// Missed (dropped on receive) packets per second.
    pub drop: f64,
    /// Transmitted packets per second.
    pub tx: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rx_bytes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_bytes: Option<f64>,
    /// At least one tracked counter went backwards.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub counter_reset: bool,
}

impl PortRates {
    /// No packet moved on this port during the interval.
    pub fn is_idle(&self) -> bool {
        self.rx == 0.0 && self.drop == 0.0 && self.tx == 0.0
    }
}

/// Rates of every active port, keyed by port id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RateRecord(BTreeMap<PortId, PortRates>);

impl RateRecord {
    pub fn get(&self, port: PortId) -> Option<&PortRates> {
        self.0.get(&port)
    }

    pub fn contains(&self, port: PortId) -> bool {
        self.0.contains_key(&port)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PortId, &PortRates)> + '_ {
        self.0.iter().map(|(port, rates)| (*port, rates))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Computes per-port rates between `previous` and `current`.
///
/// `interval_seconds` must be the measured time between the two captures.
/// Ports missing from either sample, or missing a tracked counter, get no
/// entry. Ports whose three packet rates are all exactly zero are omitted.
pub fn compute_rates(previous: &Sample, current: &Sample, interval_seconds: f64) -> RateRecord {
    let mut record = RateRecord::default();

    if !interval_seconds.is_finite() || interval_seconds <= 0.0 {
        debug!(interval_seconds = interval_seconds, "Skipping rate computation for empty interval");
        return record;
    }

    for (port, now) in current.iter() {
        let Some(before) = previous.get(port) else {
            continue;
        };
        let Some(rates) = port_rates(before, now, interval_seconds) else {
            debug!(port = port, "Tracked counters missing, no rate this cycle");
            continue;
        };
        if rates.counter_reset {
            warn!(
                port = port,
                rx = rates.rx,
                drop = rates.drop,
                tx = rates.tx,
                "Counter decreased between samples, device reset or wraparound"
            );
        }
        if rates.is_idle() {
            continue;
        }
        record.0.insert(port, rates);
    }

    record
}

fn port_rates(before: &StatSet, now: &StatSet, interval: f64) -> Option<PortRates> {
    let mut reset = false;
    let mut rate = |name: &str| -> Option<f64> {
        let (prev, cur) = (before.counter(name)?, now.counter(name)?);
        reset |= cur < prev;
        Some(counter_delta(prev, cur) / interval)
    };

    let rx = rate(RX_COUNTER)?;
    let drop = rate(DROP_COUNTER)?;
    let tx = rate(TX_COUNTER)?;
    let rx_bytes = rate(RX_BYTES_COUNTER);
    let tx_bytes = rate(TX_BYTES_COUNTER);

    Some(PortRates {
        rx,
        drop,
        tx,
        rx_bytes,
        tx_bytes,
        counter_reset: reset,
    })
}

fn counter_delta(prev: u64, cur: u64) -> f64 {
    (i128::from(cur) - i128::from(prev)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::sampler::STATS_COMMAND;
    use std::time::{Duration, Instant};

    fn stats(ipackets: u64, imissed: u64, opackets: u64) -> StatSet {
        [
            (RX_COUNTER, ipackets),
            (DROP_COUNTER, imissed),
            (TX_COUNTER, opackets),
        ]
        .into_iter()
        .collect()
    }

    fn pair(prev: Vec<(PortId, StatSet)>, cur: Vec<(PortId, StatSet)>) -> (Sample, Sample) {
        let t0 = Instant::now();
        (
            Sample::new(STATS_COMMAND, prev).with_captured(t0),
            Sample::new(STATS_COMMAND, cur).with_captured(t0 + Duration::from_secs(2)),
        )
    }

    #[test]
    fn test_rates_over_two_seconds() {
        let (prev, cur) = pair(vec![(0, stats(100, 0, 50))], vec![(0, stats(200, 10, 150))]);
        let record = compute_rates(&prev, &cur, cur.seconds_since(&prev));

        let rates = record.get(0).expect("port 0 should have rates");
        assert_eq!(rates.rx, 50.0);
        assert_eq!(rates.drop, 5.0);
        assert_eq!(rates.tx, 50.0);
        assert!(!rates.counter_reset);
        assert_eq!(rates.rx_bytes, None);
    }

    #[test]
    fn test_idle_port_omitted() {
        let (prev, cur) = pair(
            vec![(0, stats(100, 0, 50)), (1, stats(5, 5, 5))],
            vec![(0, stats(100, 0, 50)), (1, stats(7, 5, 5))],
        );
        let record = compute_rates(&prev, &cur, 2.0);
        assert!(!record.contains(0));
        assert_eq!(record.get(1).map(|r| r.rx), Some(1.0));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_new_port_has_no_rate() {
        let (prev, cur) = pair(
            vec![(0, stats(0, 0, 0))],
            vec![(0, stats(10, 0, 0)), (1, stats(1000, 0, 1000))],
        );
        let record = compute_rates(&prev, &cur, 2.0);
        assert!(record.contains(0));
        assert!(!record.contains(1));
    }

    #[test]
    fn test_removed_port_is_ignored() {
        let (prev, cur) = pair(
            vec![(0, stats(0, 0, 0)), (1, stats(0, 0, 0))],
            vec![(1, stats(4, 0, 0))],
        );
        let record = compute_rates(&prev, &cur, 2.0);
        assert_eq!(record.len(), 1);
        assert_eq!(record.get(1).map(|r| r.rx), Some(2.0));
    }

    #[test]
    fn test_counter_reset_is_flagged_not_clamped() {
        let (prev, cur) = pair(vec![(0, stats(1000, 0, 10))], vec![(0, stats(0, 0, 30))]);
        let record = compute_rates(&prev, &cur, 2.0);
        let rates = record.get(0).unwrap();
        assert_eq!(rates.rx, -500.0);
        assert_eq!(rates.tx, 10.0);
        assert!(rates.counter_reset);
    }

    #[test]
    fn test_counter_near_u64_max() {
        let (prev, cur) = pair(
            vec![(0, stats(u64::MAX - 10, 0, 0))],
            vec![(0, stats(u64::MAX, 0, 0))],
        );
        let record = compute_rates(&prev, &cur, 2.0);
        assert_eq!(record.get(0).map(|r| r.rx), Some(5.0));
    }

    #[test]
    fn test_missing_counter_skips_port() {
        let partial: StatSet = [(RX_COUNTER, 10u64), (TX_COUNTER, 10u64)].into_iter().collect();
        let (prev, cur) = pair(vec![(0, stats(0, 0, 0))], vec![(0, partial)]);
        assert!(compute_rates(&prev, &cur, 2.0).is_empty());
    }

    #[test]
    fn test_byte_rates_when_present() {
        let before: StatSet = [
            (RX_COUNTER, 0u64),
            (DROP_COUNTER, 0),
            (TX_COUNTER, 0),
            (RX_BYTES_COUNTER, 0),
            (TX_BYTES_COUNTER, 0),
        ]
        .into_iter()
        .collect();
        let after: StatSet = [
            (RX_COUNTER, 2u64),
            (DROP_COUNTER, 0),
            (TX_COUNTER, 2),
            (RX_BYTES_COUNTER, 128),
            (TX_BYTES_COUNTER, 256),
        ]
        .into_iter()
        .collect();
        let (prev, cur) = pair(vec![(0, before)], vec![(0, after)]);
        let rates = *compute_rates(&prev, &cur, 2.0).get(0).unwrap();
        assert_eq!(rates.rx_bytes, Some(64.0));
        assert_eq!(rates.tx_bytes, Some(128.0));
    }

    #[test]
    fn test_zero_interval_yields_empty_record() {
        let (prev, cur) = pair(vec![(0, stats(0, 0, 0))], vec![(0, stats(10, 0, 0))]);
        assert!(compute_rates(&prev, &cur, 0.0).is_empty());
        assert!(compute_rates(&prev, &cur, f64::NAN).is_empty());
    }

    #[test]
    fn test_serialization_shape() {
        let (prev, cur) = pair(vec![(3, stats(0, 0, 0))], vec![(3, stats(2, 0, 4))]);
        let record = compute_rates(&prev, &cur, 2.0);
        let text = serde_json::to_string(&record).unwrap();
        assert_eq!(text, r#"{"3":{"rx":1.0,"drop":0.0,"tx":2.0}}"#);
    }
}
