//! Backlog samples — trailing-window averages of queue depth.

use std::time::Duration;

use crate::error::PlatformError;

/// Trailing window the sampler averages over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleWindow {
    /// How far back the window reaches.
    pub span: Duration,
    /// Granularity of individual datapoints.
    pub period: Duration,
}

impl SampleWindow {
    /// Five minutes of one-minute datapoints.
    pub const DEFAULT: SampleWindow = SampleWindow {
        span: Duration::from_secs(5 * 60),
        period: Duration::from_secs(60),
    };
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Average backlog observed over a window. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub window: SampleWindow,
    pub average: f64,
    /// Number of datapoints the average was computed from.
    pub datapoints: usize,
}

impl Sample {
    /// Average raw datapoints into a sample.
    ///
    /// An empty slice is `PlatformError::NoDatapoints`: "no data" is not
    /// the same as a queue that is genuinely empty.
    pub fn from_datapoints(
        queue: &str,
        window: SampleWindow,
        datapoints: &[f64],
    ) -> Result<Self, PlatformError> {
        if datapoints.is_empty() {
            return Err(PlatformError::NoDatapoints {
                queue: queue.to_string(),
            });
        }
        let total: f64 = datapoints.iter().sum();
        Ok(Self {
            window,
            average: total / datapoints.len() as f64,
            datapoints: datapoints.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_is_five_one_minute_buckets() {
        let w = SampleWindow::default();
        assert_eq!(w.span, Duration::from_secs(300));
        assert_eq!(w.period, Duration::from_secs(60));
    }

    #[test]
    fn averages_datapoints() {
        let s = Sample::from_datapoints("q", SampleWindow::DEFAULT, &[10.0, 20.0, 60.0]).unwrap();
        assert_eq!(s.average, 30.0);
        assert_eq!(s.datapoints, 3);
    }

    #[test]
    fn zero_readings_are_a_real_zero() {
        let s = Sample::from_datapoints("q", SampleWindow::DEFAULT, &[0.0, 0.0]).unwrap();
        assert_eq!(s.average, 0.0);
    }

    #[test]
    fn no_datapoints_is_an_error() {
        let err = Sample::from_datapoints("orders", SampleWindow::DEFAULT, &[]).unwrap_err();
        assert_eq!(
            err,
            PlatformError::NoDatapoints {
                queue: "orders".to_string()
            }
        );
    }
}
