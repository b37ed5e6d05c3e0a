use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder,
    HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Database Metrics (MongoDB)
    pub static ref DB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "db_operations_total",
        "Total number of database operations",
        &["operation", "collection", "status"]
    )
    .unwrap();

    pub static ref DB_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "db_operation_duration_seconds",
        "Database operation duration in seconds",
        &["operation", "collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Cache Metrics (Redis checkpoints)
    pub static ref CACHE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_operations_total",
        "Total number of cache operations",
        &["operation", "status"]
    )
    .unwrap();

    // Gameplay Metrics
    pub static ref JOURNEYS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "journeys_total",
        "Journeys by lifecycle outcome",
        &["status"]
    )
    .unwrap();

    pub static ref JOURNEY_SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "journey_sessions_active",
        "Number of journeys currently being played"
    )
    .unwrap();

    pub static ref ANSWERS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "answers_submitted_total",
        "Total number of answers submitted",
        &["correct"]
    )
    .unwrap();

    pub static ref BADGES_AWARDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "badges_awarded_total",
        "Badges awarded to players",
        &["badge"]
    )
    .unwrap();

    pub static ref STAGE_UNLOCKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "stage_unlocks_total",
        "Stages unlocked through mastery",
        &["stage"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track database operation with metrics
pub async fn track_db_operation<F, T, E>(
    operation: &str,
    collection: &str,
    future: F,
) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    DB_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status])
        .inc();

    DB_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(duration);

    result
}

/// Helper: track cache operation with metrics
pub async fn track_cache_operation<F, T, E>(operation: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let result = future.await;
    let status = if result.is_ok() { "success" } else { "error" };

    CACHE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    result
}

pub fn record_answer(is_correct: bool) {
    let label = if is_correct { "true" } else { "false" };
    ANSWERS_SUBMITTED_TOTAL.with_label_values(&[label]).inc();
}

pub fn record_badge_awarded(badge_id: &str) {
    BADGES_AWARDED_TOTAL.with_label_values(&[badge_id]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_metrics() {
        JOURNEYS_TOTAL.with_label_values(&["started"]).inc();

        let output = render_metrics().unwrap();
        assert!(output.contains("journeys_total"));
    }

    #[tokio::test]
    async fn track_db_operation_counts_failures() {
        let before = DB_OPERATIONS_TOTAL
            .with_label_values(&["insert_one", "metrics_test", "error"])
            .get();

        let result: Result<(), &str> =
            track_db_operation("insert_one", "metrics_test", async { Err("boom") }).await;

        assert!(result.is_err());
        let after = DB_OPERATIONS_TOTAL
            .with_label_values(&["insert_one", "metrics_test", "error"])
            .get();
        assert_eq!(after, before + 1);
    }
}
