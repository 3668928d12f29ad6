//! Run metrics using metrics-rs, with an in-process recorder for the CLI.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit, counter,
    describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use parking_lot::RwLock;

use crate::harness::RunSummary;

/// Register metric descriptions. Call once at startup.
pub fn init() {
    describe_counter!(
        "tandem_instructions_total",
        Unit::Count,
        "Instructions retired by the processor under test"
    );
    describe_counter!(
        "tandem_verification_packets_total",
        Unit::Count,
        "Verification packets delivered to the active strategy"
    );
    describe_counter!(
        "tandem_verification_skipped_total",
        Unit::Count,
        "Verification packets dropped by the transport"
    );
    describe_counter!(
        "tandem_verification_mismatches_total",
        Unit::Count,
        "Packets flagged by the active strategy"
    );
    describe_counter!(
        "tandem_mmio_requests_total",
        Unit::Count,
        "External MMIO requests served"
    );
    describe_counter!("tandem_runs_passed_total", Unit::Count, "Runs that passed");
    describe_counter!("tandem_runs_failed_total", Unit::Count, "Runs that failed");

    describe_gauge!(
        "tandem_execution_time_seconds",
        Unit::Seconds,
        "Workload wall-clock time"
    );
    describe_gauge!(
        "tandem_device_speed_mips",
        Unit::Count,
        "Device instruction speed in MIPS"
    );
    describe_gauge!(
        "tandem_clock_requested_hz",
        Unit::Count,
        "Requested main clock frequency"
    );
    describe_gauge!(
        "tandem_clock_actual_hz",
        Unit::Count,
        "Granted main clock frequency"
    );
    describe_gauge!("tandem_host_ipc", Unit::Count, "Host instructions per cycle");

    describe_histogram!(
        "tandem_run_duration_seconds",
        Unit::Seconds,
        "Distribution of workload run durations"
    );
}

/// Record the metrics of a completed run.
pub fn record_run(summary: &RunSummary) {
    let labels = [("mode", summary.mode.to_string())];

    counter!("tandem_instructions_total", &labels).absolute(summary.performance.instret);
    counter!("tandem_verification_packets_total", &labels).absolute(summary.verification.packets);
    counter!("tandem_verification_skipped_total", &labels).absolute(summary.verification.skipped);
    counter!("tandem_verification_mismatches_total", &labels)
        .absolute(summary.verification.mismatches);
    counter!("tandem_mmio_requests_total", &labels).absolute(summary.performance.mmio_requests);

    if summary.outcome == 0 {
        counter!("tandem_runs_passed_total", &labels).increment(1);
    } else {
        counter!("tandem_runs_failed_total", &labels).increment(1);
    }

    let elapsed = summary.performance.elapsed.as_secs_f64();
    gauge!("tandem_execution_time_seconds", &labels).set(elapsed);
    histogram!("tandem_run_duration_seconds", &labels).record(elapsed);
    gauge!("tandem_device_speed_mips", &labels).set(summary.performance.mips());
    gauge!("tandem_clock_requested_hz").set(summary.clock.requested_hz as f64);
    gauge!("tandem_clock_actual_hz").set(summary.clock.actual_hz as f64);
    if let Some(ipc) = summary.performance.host.ipc() {
        gauge!("tandem_host_ipc", &labels).set(ipc);
    }
}

#[derive(Default)]
struct CounterStorage {
    values: RwLock<HashMap<String, u64>>,
}

#[derive(Default)]
struct GaugeStorage {
    values: RwLock<HashMap<String, f64>>,
}

#[derive(Default)]
struct HistogramStorage {
    values: RwLock<HashMap<String, Vec<f64>>>,
}

struct CliCounter {
    key: String,
    storage: Arc<CounterStorage>,
}

impl metrics::CounterFn for CliCounter {
    fn increment(&self, value: u64) {
        *self.storage.values.write().entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        self.storage.values.write().insert(self.key.clone(), value);
    }
}

struct CliGauge {
    key: String,
    storage: Arc<GaugeStorage>,
}

impl metrics::GaugeFn for CliGauge {
    fn increment(&self, value: f64) {
        *self.storage.values.write().entry(self.key.clone()).or_insert(0.0) += value;
    }

    fn decrement(&self, value: f64) {
        *self.storage.values.write().entry(self.key.clone()).or_insert(0.0) -= value;
    }

    fn set(&self, value: f64) {
        self.storage.values.write().insert(self.key.clone(), value);
    }
}

struct CliHistogram {
    key: String,
    storage: Arc<HistogramStorage>,
}

impl metrics::HistogramFn for CliHistogram {
    fn record(&self, value: f64) {
        self.storage
            .values
            .write()
            .entry(self.key.clone())
            .or_default()
            .push(value);
    }
}

/// Recorder keeping metrics in memory for a summary at exit.
#[derive(Default)]
pub struct CliRecorder {
    counters: Arc<CounterStorage>,
    gauges: Arc<GaugeStorage>,
    histograms: Arc<HistogramStorage>,
}

impl CliRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install as the global recorder. `None` if one is already installed.
    pub fn install(self) -> Option<CliRecorderHandle> {
        let handle = self.handle();
        metrics::set_global_recorder(self).ok()?;
        Some(handle)
    }

    /// Handle reading this recorder's storage.
    pub fn handle(&self) -> CliRecorderHandle {
        CliRecorderHandle {
            counters: Arc::clone(&self.counters),
            gauges: Arc::clone(&self.gauges),
            histograms: Arc::clone(&self.histograms),
        }
    }
}

fn key_to_string(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|l| format!("{}={}", l.key(), l.value()))
        .collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CliCounter {
            key: key_to_string(key),
            storage: Arc::clone(&self.counters),
        }))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(Arc::new(CliGauge {
            key: key_to_string(key),
            storage: Arc::clone(&self.gauges),
        }))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(CliHistogram {
            key: key_to_string(key),
            storage: Arc::clone(&self.histograms),
        }))
    }
}

/// Read access to a [`CliRecorder`]'s metrics.
pub struct CliRecorderHandle {
    counters: Arc<CounterStorage>,
    gauges: Arc<GaugeStorage>,
    histograms: Arc<HistogramStorage>,
}

impl CliRecorderHandle {
    pub fn get_counter(&self, key: &str) -> Option<u64> {
        self.counters.values.read().get(key).copied()
    }

    pub fn get_gauge(&self, key: &str) -> Option<f64> {
        self.gauges.values.read().get(key).copied()
    }

    /// Render every metric, sorted by key.
    pub fn summary(&self) -> String {
        let counters = self.counters.values.read();
        let gauges = self.gauges.values.read();
        let histograms = self.histograms.values.read();

        if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
            return "No metrics collected.\n".to_string();
        }

        let mut out = String::from("\n## Metrics Summary\n\n");
        if !counters.is_empty() {
            out.push_str("### Counters\n");
            let mut entries: Vec<_> = counters.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in entries {
                out.push_str(&format!("  {key}: {value}\n"));
            }
            out.push('\n');
        }
        if !gauges.is_empty() {
            out.push_str("### Gauges\n");
            let mut entries: Vec<_> = gauges.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in entries {
                out.push_str(&format!("  {key}: {value:.6}\n"));
            }
            out.push('\n');
        }
        if !histograms.is_empty() {
            out.push_str("### Histograms\n");
            let mut entries: Vec<_> = histograms.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, values) in entries {
                let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
                out.push_str(&format!("  {key}: n={} mean={mean:.6}\n", values.len()));
            }
            out.push('\n');
        }
        out
    }

    /// Print all collected metrics to stdout.
    pub fn print_summary(&self) {
        print!("{}", self.summary());
    }
}
