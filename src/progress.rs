/// Sink for aggregate completion fractions emitted by pipeline stages.
pub trait ProgressSink: Send + Sync {
    /// Report overall completion in `0.0..=1.0`.
    fn advance(&self, fraction: f64);
}

/// Sink that discards everything, for headless callers.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&self, _fraction: f64) {}
}
