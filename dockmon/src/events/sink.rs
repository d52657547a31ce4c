//! Subscriber output sinks

use thiserror::Error;
use tokio::sync::mpsc;

use crate::events::event::Frame;

/// Returned by a sink whose connection has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event sink closed")]
pub struct SinkClosed;

/// Destination for the frames of one subscriber
pub trait EventSink: Send + Sync {
    /// Hand one frame to the connection
    fn deliver(&self, frame: &Frame) -> Result<(), SinkClosed>;

    /// Whether the connection is known to be gone
    fn is_closed(&self) -> bool;
}

/// Channel feeding an HTTP event stream
impl EventSink for mpsc::UnboundedSender<Frame> {
    fn deliver(&self, frame: &Frame) -> Result<(), SinkClosed> {
        self.send(frame.clone()).map_err(|_| SinkClosed)
    }

    fn is_closed(&self) -> bool {
        mpsc::UnboundedSender::is_closed(self)
    }
}
