//! Request volume, latency and running-median metrics, keyed by endpoint.
//!
//! - price_prediction_requests_total
//! - price_prediction_duration_seconds
//! - price_prediction_median

use parking_lot::Mutex;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use std::time::Duration;

use crate::median::RunningMedian;

pub const DURATION_BUCKETS: [f64; 8] = [0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0];

/// Prometheus instruments plus the per-endpoint prediction windows.
pub struct MetricsRecorder {
    registry: Registry,
    request_count: IntCounterVec,
    request_duration: HistogramVec,
    prediction_median: GaugeVec,
    medians: Mutex<HashMap<String, RunningMedian>>,
    median_window: usize,
}

impl MetricsRecorder {
    /// Create the instruments and register them with `registry`.
    pub fn new(registry: Registry, median_window: usize) -> Result<Self, prometheus::Error> {
        let request_count = IntCounterVec::new(
            Opts::new(
                "price_prediction_requests_total",
                "Total number of price prediction requests",
            ),
            &["endpoint"],
        )?;
        registry.register(Box::new(request_count.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "price_prediction_duration_seconds",
                "Duration of price prediction processing",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["endpoint"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        let prediction_median = GaugeVec::new(
            Opts::new(
                "price_prediction_median",
                "Median value of recent predictions",
            ),
            &["endpoint"],
        )?;
        registry.register(Box::new(prediction_median.clone()))?;

        Ok(Self {
            registry,
            request_count,
            request_duration,
            prediction_median,
            medians: Mutex::new(HashMap::new()),
            median_window,
        })
    }

    pub fn increment_requests(&self, endpoint: &str) {
        self.request_count.with_label_values(&[endpoint]).inc();
    }

    pub fn observe_duration(&self, endpoint: &str, duration: Duration) {
        self.request_duration
            .with_label_values(&[endpoint])
            .observe(duration.as_secs_f64());
    }

    /// Feed a prediction into the endpoint's window and republish its median.
    ///
    /// The gauge is set while the window lock is held, so publishes happen in
    /// the same order as window updates.
    pub fn observe_prediction(&self, endpoint: &str, value: f64) {
        let mut medians = self.medians.lock();
        let window = medians
            .entry(endpoint.to_string())
            .or_insert_with(|| RunningMedian::new(self.median_window));
        window.push(value);
        if let Some(m) = window.median() {
            self.prediction_median.with_label_values(&[endpoint]).set(m);
        }
    }

    /// Duration is always recorded; the prediction only when there is one.
    pub fn record(&self, endpoint: &str, duration: Duration, prediction: Option<f64>) {
        self.observe_duration(endpoint, duration);
        if let Some(value) = prediction {
            self.observe_prediction(endpoint, value);
        }
    }

    pub fn request_count(&self, endpoint: &str) -> u64 {
        self.request_count.with_label_values(&[endpoint]).get()
    }

    pub fn duration_samples(&self, endpoint: &str) -> u64 {
        self.request_duration.with_label_values(&[endpoint]).get_sample_count()
    }

    /// Current median for `endpoint`, if any prediction was observed.
    pub fn median(&self, endpoint: &str) -> Option<f64> {
        self.medians.lock().get(endpoint).and_then(RunningMedian::median)
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
