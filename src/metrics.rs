use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Request counters and latency accumulators, rendered as Prometheus
/// exposition text at `GET /metrics`. Durations are accumulated in
/// microseconds and rendered in seconds.
#[derive(Default)]
pub struct Metrics {
    insert_requests: AtomicU64,
    search_requests: AtomicU64,
    insert_duration_us: AtomicU64,
    search_duration_us: AtomicU64,
    vectors_total: AtomicU64,
}

impl Metrics {
    pub fn observe_insert(&self, elapsed: Duration) {
        self.insert_requests.fetch_add(1, Ordering::Relaxed);
        self.insert_duration_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn observe_search(&self, elapsed: Duration) {
        self.search_requests.fetch_add(1, Ordering::Relaxed);
        self.search_duration_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn set_vectors(&self, count: u64) {
        self.vectors_total.store(count, Ordering::Relaxed);
    }

    pub fn render(&self) -> String {
        let inserts = self.insert_requests.load(Ordering::Relaxed);
        let searches = self.search_requests.load(Ordering::Relaxed);
        let insert_secs = self.insert_duration_us.load(Ordering::Relaxed) as f64 / 1e6;
        let search_secs = self.search_duration_us.load(Ordering::Relaxed) as f64 / 1e6;
        let vectors = self.vectors_total.load(Ordering::Relaxed);

        let mut out = String::with_capacity(512);
        out.push_str("# TYPE vexel_insert_requests_total counter\n");
        out.push_str(&format!("vexel_insert_requests_total {inserts}\n"));
        out.push_str("# TYPE vexel_search_requests_total counter\n");
        out.push_str(&format!("vexel_search_requests_total {searches}\n"));
        out.push_str("# TYPE vexel_insert_duration_seconds summary\n");
        out.push_str(&format!("vexel_insert_duration_seconds_sum {insert_secs}\n"));
        out.push_str(&format!("vexel_insert_duration_seconds_count {inserts}\n"));
        out.push_str("# TYPE vexel_search_duration_seconds summary\n");
        out.push_str(&format!("vexel_search_duration_seconds_sum {search_secs}\n"));
        out.push_str(&format!("vexel_search_duration_seconds_count {searches}\n"));
        out.push_str("# TYPE vexel_vectors_total gauge\n");
        out.push_str(&format!("vexel_vectors_total {vectors}\n"));
        out
    }
}
