// overlens-camera/src/stream.rs
use crate::{CameraError, FrameSource, YuvFrame};
use futures_core::Stream;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::{wrappers::WatchStream, StreamExt};

// back-pressure: source thread → watch slot → consumer
// A slow consumer only ever sees the newest frame; older ones are overwritten.
pub fn frame_stream<S>(mut source: S) -> impl Stream<Item = Arc<YuvFrame>>
where
    S: FrameSource + Send + 'static,
{
    let (tx, rx) = watch::channel::<Option<Arc<YuvFrame>>>(None);

    std::thread::spawn(move || loop {
        match source.next_frame_blocking() {
            Ok(frame) => {
                if tx.send(Some(Arc::new(frame))).is_err() {
                    break; // consumer dropped
                }
            }
            Err(CameraError::EndOfStream) => break,
            Err(e) => {
                log::error!("frame source failed: {e}");
                break;
            }
        }
    });

    WatchStream::new(rx).filter_map(|frame| frame)
}
