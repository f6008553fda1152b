use std::{fmt::Write, sync::LazyLock};

use indicatif::{FormattedDuration, ProgressState};
use tracing::Span;
use tracing_indicatif::{span_ext::IndicatifSpanExt, style::ProgressStyle};

use crate::progress::ProgressSink;

fn pb_eta(state: &ProgressState, w: &mut dyn Write) {
    write!(w, "{}", FormattedDuration(state.eta())).unwrap()
}

pub static PROGRESS_STYLE_DOWNLOAD: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes:>11}/{total_bytes:<11} ETA {eta:<8}")
        .unwrap()
        .with_key("eta", pb_eta)
        .progress_chars("=> ")
});

pub static PROGRESS_STYLE_STAGE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::with_template("{spinner:.green} {msg} [{wide_bar:.cyan/blue}] {percent:>3}%")
        .unwrap()
        .progress_chars("=> ")
});

/// Drives the progress bar of a stage span from reported fractions.
pub struct SpanProgress(Span);

impl SpanProgress {
    pub fn new(span: Span, msg: &str) -> Self {
        span.pb_set_style(&PROGRESS_STYLE_STAGE);
        span.pb_set_length(100);
        span.pb_set_message(msg);
        Self(span)
    }
}

impl ProgressSink for SpanProgress {
    fn advance(&self, fraction: f64) {
        self.0
            .pb_set_position((fraction.clamp(0.0, 1.0) * 100.0).round() as u64);
    }
}
