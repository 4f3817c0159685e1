use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

pub static ATTEMPTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("titlesep_remote_attempts_total", "Total remote lookup attempts")
        .expect("valid counter opts")
});
pub static FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("titlesep_remote_failures_total", "Total failed remote lookup attempts")
        .expect("valid counter opts")
});
pub static LATENCY_HIST: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(HistogramOpts::new(
        "titlesep_remote_latency_seconds",
        "Remote lookup latency per attempt",
    ))
    .expect("valid histogram opts")
});

pub fn register(reg: &Registry) {
    reg.register(Box::new(ATTEMPTS_TOTAL.clone())).ok();
    reg.register(Box::new(FAILURES_TOTAL.clone())).ok();
    reg.register(Box::new(LATENCY_HIST.clone())).ok();
}
