use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub bookings_total: IntCounterVec,
    pub booking_creation_latency_seconds: HistogramVec,
    pub booking_side_steps_total: IntCounterVec,
    pub provider_notifications_total: IntCounterVec,
    pub matched_providers: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bookings_total = IntCounterVec::new(
            Opts::new("bookings_total", "Booking creation attempts by outcome"),
            &["outcome"],
        )
        .expect("valid bookings_total metric");

        let booking_creation_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "booking_creation_latency_seconds",
                "Latency of booking creation in seconds",
            ),
            &["outcome"],
        )
        .expect("valid booking_creation_latency_seconds metric");

        let booking_side_steps_total = IntCounterVec::new(
            Opts::new(
                "booking_side_steps_total",
                "Best-effort booking side steps by step and outcome",
            ),
            &["step", "outcome"],
        )
        .expect("valid booking_side_steps_total metric");

        let provider_notifications_total = IntCounterVec::new(
            Opts::new(
                "provider_notifications_total",
                "Provider notification deliveries by channel and outcome",
            ),
            &["channel", "outcome"],
        )
        .expect("valid provider_notifications_total metric");

        let matched_providers = Histogram::with_opts(
            HistogramOpts::new("matched_providers", "Eligible providers per matching run")
                .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        )
        .expect("valid matched_providers metric");

        registry
            .register(Box::new(bookings_total.clone()))
            .expect("register bookings_total");
        registry
            .register(Box::new(booking_creation_latency_seconds.clone()))
            .expect("register booking_creation_latency_seconds");
        registry
            .register(Box::new(booking_side_steps_total.clone()))
            .expect("register booking_side_steps_total");
        registry
            .register(Box::new(provider_notifications_total.clone()))
            .expect("register provider_notifications_total");
        registry
            .register(Box::new(matched_providers.clone()))
            .expect("register matched_providers");

        Self {
            registry,
            bookings_total,
            booking_creation_latency_seconds,
            booking_side_steps_total,
            provider_notifications_total,
            matched_providers,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
