use super::GLOBAL_LABELS;

/// Histogram buckets to measure the distribution of request durations in seconds
const DEFAULT_DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

const METRICS_PORT: u16 = 2000;

pub fn init_metrics() {
    let mut builder = metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], METRICS_PORT))
        .set_buckets(DEFAULT_DURATION_BUCKETS)
        .expect("BUG: default histogram buckets must not be empty");

    for (key, value) in GLOBAL_LABELS {
        builder = builder.add_global_label(*key, *value);
    }

    builder
        .install()
        .expect("BUG: failed to initialize the metrics listener");

    describe_metrics();
}

fn describe_metrics() {
    metrics::describe_counter!(
        crate::tg::TG_UPDATES_TOTAL,
        "Number of updates received from Telegram"
    );
    metrics::describe_counter!(
        crate::tg::TG_UPDATES_SKIPPED_TOTAL,
        "Number of updates received from Telegram, that were skipped by the bot"
    );
    metrics::describe_counter!(
        crate::referral::REFERRAL_CREDITS_TOTAL,
        "Outcomes of referral crediting attempts"
    );
    metrics::describe_histogram!(
        crate::api::HTTP_REQUEST_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Duration of HTTP API requests"
    );
}
