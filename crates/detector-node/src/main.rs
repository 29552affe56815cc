use anyhow::Result;
use chrono::Utc;
use detector_node::buffer::DetectionBuffer;
use detector_node::config::DetectorNodeConfig;
use detector_node::pipeline::FramePipeline;
use detector_node::source::{FrameSource, SyntheticSource};
use detector_node::status::{spawn_heartbeat, HeartbeatState};
use detector_node::tracker::PlateTracker;
use detector_node::transport::{spawn_sender, TransportQueue};
use detector_node::vision::mock::{MockPlateRecognizer, MockVehicleDetector};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_with_service("detector-node");

    info!("Starting detector node...");

    let config = DetectorNodeConfig::from_env()?;
    info!(
        ingest_url = %config.ingest_url,
        output = %config.output_path.display(),
        fps = config.fps,
        "detector node configuration"
    );

    if let Some(parent) = config.output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // The real detector and recognizer are external models; the mocks stand in
    // for them in demonstration runs.
    let detector = Arc::new(MockVehicleDetector::new());
    let recognizer = Arc::new(MockPlateRecognizer::new());

    let cancel = CancellationToken::new();

    let queue = TransportQueue::new(config.queue_capacity);
    let sender = spawn_sender(queue.clone(), config.transport_config(), cancel.clone());

    let heartbeat_state = Arc::new(HeartbeatState::new());
    let heartbeat = spawn_heartbeat(
        heartbeat_state.clone(),
        config.status_endpoint(),
        config.status_interval_secs,
        cancel.clone(),
    );

    let mut pipeline = FramePipeline::new(
        detector,
        recognizer,
        config.roi_gate(),
        PlateTracker::new(config.tracker_config()),
        DetectionBuffer::new(config.flush_config()),
        queue,
        config.pipeline_config(),
    );

    let mut source = SyntheticSource::new(
        config.frame_width,
        config.frame_height,
        config.fps,
        config.total_frames,
    )
    .paced();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("shutdown requested, stopping frame loop");
                break;
            }
            frame = source.next_frame() => {
                match frame {
                    Ok(Some(frame)) => {
                        pipeline.process_frame(&frame, Utc::now()).await;
                        heartbeat_state.record_frame();
                    }
                    Ok(None) => {
                        info!("frame source exhausted");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "frame source failed");
                        break;
                    }
                }
            }
        }
    }

    heartbeat_state.set_running(false);

    // last-chance durability; on failure the buffered detections are lost
    match pipeline.finish() {
        Ok(rows) => info!(rows, "final detection flush complete"),
        Err(e) => error!(error = %e, "final detection flush failed, buffered detections lost"),
    }

    cancel.cancel();
    let _ = sender.await;
    let _ = heartbeat.await;

    info!("detector node stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
