use lazy_static::lazy_static;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Detector Node Metrics ====
    pub static ref DETECTOR_FRAMES_PROCESSED: IntCounter = {
        let metric = IntCounter::new(
            "detector_node_frames_processed_total",
            "Total number of frames run through the detection pipeline",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref DETECTOR_TRACK_OUTCOMES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "detector_node_track_outcomes_total",
                "Plate tracker decisions per sighting",
            ),
            &["outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref DETECTOR_TRACKED_PLATES: IntGauge = {
        let metric = IntGauge::new(
            "detector_node_tracked_plates",
            "Plate texts currently held by the tracker",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref DETECTOR_ROWS_FLUSHED: IntCounter = {
        let metric = IntCounter::new(
            "detector_node_rows_flushed_total",
            "Detection rows appended to the durable CSV log",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref DETECTOR_TRANSPORT_EVENTS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "detector_node_transport_events_total",
                "Detection events handled by the remote transport",
            ),
            &["status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Ingest Service Metrics ====
    pub static ref INGEST_EVENTS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "ingest_events_total",
                "Detection events processed by the ingest service",
            ),
            &["result"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref INGEST_BATCHES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "ingest_batches_total",
                "Ingest batches by commit status",
            ),
            &["status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref INGEST_BATCH_SECONDS: Histogram = {
        let metric = Histogram::with_opts(HistogramOpts::new(
            "ingest_batch_seconds",
            "Time spent committing an ingest batch",
        ))
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref INGEST_OCCUPIED_SPACES: IntGauge = {
        let metric = IntGauge::new(
            "ingest_occupied_spaces",
            "Occupied spaces after the most recent committed event",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}
