//! Synthetic frame producer used when no real capture pipeline is wired
//! in. Exists so the server is runnable and demonstrable on its own;
//! gated behind `producer.demo_enabled`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::blank::{BLANK_HEIGHT, BLANK_JPEG, BLANK_WIDTH};
use crate::producer::FrameSlot;

/// Publish the embedded blank JPEG into `frame_slot` at `fps` until
/// `cancel` fires. A stand-in for a real camera/encoder pipeline.
pub async fn run(frame_slot: Arc<FrameSlot>, fps: u32, cancel: CancellationToken) {
    let period = Duration::from_micros(1_000_000 / fps.max(1) as u64);
    let mut ticker = tokio::time::interval(period);

    info!("demo producer started at {} fps", fps);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                frame_slot.publish(BLANK_JPEG, BLANK_WIDTH, BLANK_HEIGHT);
            }
        }
    }

    info!("demo producer stopped");
}
