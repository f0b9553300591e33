use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for the detection loop: per-stage timings, per-frame metrics
/// and a closing summary.
///
/// The detection task owns its logger, so implementations never need to be
/// shared across threads.
pub trait PipelineLogger: Send {
    /// Called once for every frame that went through detection.
    fn frame_processed(&mut self, index: usize);

    /// Record how long a named stage (`face`, `eyes`, `classify`) took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a per-frame metric such as a candidate count.
    fn metric(&mut self, name: &str, value: f64);

    /// Emitted when the task stops. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything. Library default and test logger.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn frame_processed(&mut self, _index: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Stat {
    count: usize,
    total: f64,
    max: f64,
}

impl Stat {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.max = self.max.max(value);
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Aggregates timings and metrics in constant memory and reports them
/// through `log` when the tracker stops.
///
/// A progress line is logged every `report_every` frames.
pub struct StdoutPipelineLogger {
    report_every: usize,
    timings: BTreeMap<String, Stat>,
    metrics: BTreeMap<String, Stat>,
    started: Instant,
    frames: usize,
    last_index: Option<usize>,
}

impl StdoutPipelineLogger {
    pub fn new(report_every: usize) -> Self {
        Self {
            report_every: report_every.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            frames: 0,
            last_index: None,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// `(samples, mean)` for a stage.
    pub fn timing_stats(&self, stage: &str) -> Option<(usize, f64)> {
        self.timings.get(stage).map(|s| (s.count, s.mean()))
    }

    /// `(samples, mean)` for a metric.
    pub fn metric_stats(&self, name: &str) -> Option<(usize, f64)> {
        self.metrics.get(name).map(|s| (s.count, s.mean()))
    }

    /// Formatted report, or `None` before anything was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.frames == 0 && self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Detection summary ({} frames in {elapsed:.1}s):",
            self.frames
        )];
        for (stage, stat) in &self.timings {
            lines.push(format!(
                "  {stage:10}: avg {:6.1}ms  max {:6.1}ms",
                stat.mean(),
                stat.max
            ));
        }
        for (name, stat) in &self.metrics {
            lines.push(format!("  {name}: avg {:.1}  max {:.0}", stat.mean(), stat.max));
        }
        if self.frames > 0 && elapsed > 0.0 {
            lines.push(format!(
                "  Throughput: {:.1} detections/s",
                self.frames as f64 / elapsed
            ));
        }
        Some(lines.join("\n"))
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(300)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn frame_processed(&mut self, index: usize) {
        self.frames += 1;
        if let Some(previous) = self.last_index {
            let skipped = index.saturating_sub(previous + 1);
            if skipped > 0 {
                log::trace!("Detection skipped {skipped} captured frames");
            }
        }
        self.last_index = Some(index);
        if self.frames % self.report_every == 0 {
            log::info!("Processed {} frames (latest #{index})", self.frames);
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings.entry(stage.to_string()).or_default().add(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().add(value);
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
