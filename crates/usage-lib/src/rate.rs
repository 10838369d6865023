//! Network throughput from cumulative kubelet counters
//!
//! Kubelet reports RX/TX as byte totals since the pod started, so the rate is
//! the average over the pod's lifetime, not over the last polling interval.

use crate::models::LiveUsageSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Average network throughput of a pod in bytes per second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRates {
    pub rx_bytes_per_sec: u64,
    pub tx_bytes_per_sec: u64,
}

/// Reasons a rate cannot be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateError {
    #[error("pod started less than a second ago")]
    ZeroElapsed,

    #[error("pod start time is {0}s in the future")]
    StartInFuture(i64),

    #[error("pod start time not reported")]
    UnknownStart,
}

/// Whole seconds between pod start and `now`, truncated
pub fn elapsed_seconds(sample: &LiveUsageSample, now: DateTime<Utc>) -> Option<i64> {
    sample
        .start_time
        .map(|start| (now - start).num_seconds())
}

/// Average RX/TX rates since pod start
pub fn derive_rates(
    sample: &LiveUsageSample,
    now: DateTime<Utc>,
) -> Result<NetworkRates, RateError> {
    let elapsed = elapsed_seconds(sample, now).ok_or(RateError::UnknownStart)?;
    let secs = match u64::try_from(elapsed) {
        Ok(0) => return Err(RateError::ZeroElapsed),
        Ok(secs) => secs,
        Err(_) => return Err(RateError::StartInFuture(-elapsed)),
    };

    Ok(NetworkRates {
        rx_bytes_per_sec: sample.rx_bytes / secs,
        tx_bytes_per_sec: sample.tx_bytes / secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PodKey;
    use crate::quantity::{CPU, MEMORY};
    use chrono::{Duration, TimeZone};

    fn sample_started_at(start_time: DateTime<Utc>) -> LiveUsageSample {
        LiveUsageSample {
            pod: PodKey::new("default", "web-1"),
            start_time: Some(start_time),
            cpu_nano_cores: 12_500_000,
            memory_bytes: 64 * 1024 * 1024,
            rx_bytes: 500,
            tx_bytes: 1234,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_rate_over_ten_seconds() {
        let sample = sample_started_at(t0());

        let rates = derive_rates(&sample, t0() + Duration::seconds(10)).unwrap();

        assert_eq!(rates.rx_bytes_per_sec, 50);
        assert_eq!(rates.tx_bytes_per_sec, 123);
    }

    #[test]
    fn test_elapsed_is_truncated_to_whole_seconds() {
        let sample = sample_started_at(t0());
        let now = t0() + Duration::milliseconds(10_900);

        assert_eq!(elapsed_seconds(&sample, now), Some(10));
        assert_eq!(derive_rates(&sample, now).unwrap().rx_bytes_per_sec, 50);
    }

    #[test]
    fn test_zero_elapsed_is_undefined() {
        let sample = sample_started_at(t0());

        assert_eq!(derive_rates(&sample, t0()), Err(RateError::ZeroElapsed));
        assert_eq!(
            derive_rates(&sample, t0() + Duration::milliseconds(999)),
            Err(RateError::ZeroElapsed)
        );
    }

    #[test]
    fn test_start_in_future_is_undefined() {
        let sample = sample_started_at(t0() + Duration::seconds(5));

        assert_eq!(derive_rates(&sample, t0()), Err(RateError::StartInFuture(5)));
    }

    #[test]
    fn test_missing_start_is_undefined() {
        let sample = LiveUsageSample {
            start_time: None,
            ..sample_started_at(t0())
        };

        assert_eq!(elapsed_seconds(&sample, t0()), None);
        assert_eq!(derive_rates(&sample, t0()), Err(RateError::UnknownStart));
        // usage is still reported
        assert_eq!(sample.used().get(CPU), 12_500_000);
    }

    #[test]
    fn test_used_passes_cpu_and_memory_through() {
        let used = sample_started_at(t0()).used();

        assert_eq!(used.get(CPU), 12_500_000);
        assert_eq!(used.get(MEMORY), 64 * 1024 * 1024);
        assert_eq!(used.len(), 2);
    }
}
