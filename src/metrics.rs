use tracing::trace;

// Trace-based counters; the Prometheus handle only renders what the
// exporter has registered.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "pricebot.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn upstream_elapsed(endpoint: &'static str, elapsed_ms: u128) {
    trace!(
        target = "pricebot.metrics",
        endpoint = endpoint,
        elapsed_ms = elapsed_ms as u64,
        "upstream_elapsed"
    );
}

pub fn bulk_finished(total: usize, proposed: usize) {
    trace!(
        target = "pricebot.metrics",
        total = total as u64,
        proposed = proposed as u64,
        "bulk_job_finished"
    );
}
