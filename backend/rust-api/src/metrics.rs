use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
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

    // Game Metrics
    pub static ref TYPING_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "typing_attempts_total",
        "Total number of typing attempts recorded",
        &["rewarded"]
    )
    .unwrap();

    pub static ref SEASON_ROTATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "season_rotations_total",
        "Season rotation runs by outcome",
        &["status"]
    )
    .unwrap();

    pub static ref SEASON_REWARDS_DISBURSED_TOTAL: IntCounter = register_int_counter!(
        "season_rewards_disbursed_total",
        "Number of season rewards paid out to ranked students"
    )
    .unwrap();

    // Wallet Metrics
    pub static ref COINS_CREDITED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "coins_credited_total",
        "Coins credited to user balances",
        &["source"]
    )
    .unwrap();

    pub static ref COINS_DEBITED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "coins_debited_total",
        "Coins debited from user balances",
        &["source"]
    )
    .unwrap();

    pub static ref PURCHASES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "purchases_total",
        "Shop purchase attempts by outcome",
        &["status"]
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

pub fn record_coins_credited(source: &str, amount: i64) {
    if amount > 0 {
        COINS_CREDITED_TOTAL
            .with_label_values(&[source])
            .inc_by(amount as u64);
    }
}

pub fn record_coins_debited(source: &str, amount: i64) {
    if amount > 0 {
        COINS_DEBITED_TOTAL
            .with_label_values(&[source])
            .inc_by(amount as u64);
    }
}
