// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test-only helpers for asserting on hedging's metrics and log output.
//!
//! Grounded on `crates/testing_aids/src/log.rs`'s `LogCapture` (kept close
//! to its original shape, minus the workspace-root file-logging machinery,
//! which is monorepo-specific) and the `MetricTester` usage pattern implied
//! by the teacher's own hedging tests (`tester.meter_provider()`).

use std::io;
use std::sync::{Arc, Mutex};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::MeterProvider as _;
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics::{data::ResourceMetrics, InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};

use tracing_subscriber::fmt::MakeWriter;

/// Captures everything written through a `tracing` subscriber built from
/// [`LogCapture::subscriber`], so tests can assert on log content without
/// touching stdout.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().expect("log buffer poisoned")).into_owned()
    }

    pub fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(output.contains(expected), "expected log output to contain {expected:?}, got:\n{output}");
    }

    #[must_use]
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        use tracing_subscriber::prelude::*;
        tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_writer(self.clone()).with_ansi(false))
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter { buffer: Arc::clone(&self.buffer) }
    }
}

pub struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for LogCaptureWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buffer.lock().expect("log buffer poisoned").extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Wraps an in-memory OpenTelemetry metric exporter so tests can assert on
/// emitted counters without standing up a real collector.
#[cfg(feature = "metrics")]
pub struct MetricTester {
    provider: SdkMeterProvider,
    exporter: InMemoryMetricExporter,
}

#[cfg(feature = "metrics")]
impl MetricTester {
    #[must_use]
    pub fn new() -> Self {
        let exporter = InMemoryMetricExporter::default();
        let reader = PeriodicReader::builder(exporter.clone()).build();
        let provider = SdkMeterProvider::builder().with_reader(reader).build();
        Self { provider, exporter }
    }

    #[must_use]
    pub fn meter_provider(&self) -> impl opentelemetry::metrics::MeterProvider + Clone + use<> {
        self.provider.clone()
    }

    /// Forces the pending metrics through the exporter and returns every
    /// batch collected so far.
    pub fn collect(&self) -> Vec<ResourceMetrics> {
        self.provider.force_flush().expect("flush should not fail in tests");
        self.exporter.get_finished_metrics().expect("in-memory exporter should not fail")
    }
}

#[cfg(feature = "metrics")]
impl Default for MetricTester {
    fn default() -> Self {
        Self::new()
    }
}
