//! Stream targets: where an acquired stream is handed off
//!
//! A target is either a passive playback element that simply receives the
//! stream, or an active handler that does its own downstream processing.
//! Handlers declare which optional lifecycle hooks they implement through
//! [`Capabilities`]; the session manager only calls declared hooks.

pub mod pcm;

use tracing::debug;

use crate::audio::MediaStream;
use crate::error::{MediaError, SessionError};

pub use pcm::PcmStreamer;

/// Optional hooks a [`StreamHandler`] implements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub start: bool,
    pub stop: bool,
    pub on_stream_start: bool,
    pub on_stream_stop: bool,
    pub on_stream_error: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        start: false,
        stop: false,
        on_stream_start: false,
        on_stream_stop: false,
        on_stream_error: false,
    };

    pub const ALL: Capabilities = Capabilities {
        start: true,
        stop: true,
        on_stream_start: true,
        on_stream_stop: true,
        on_stream_error: true,
    };
}

/// Active consumer of a captured stream
pub trait StreamHandler: Send {
    /// Receive a newly opened stream, or `None` when it is released
    fn set_stream(&mut self, stream: Option<&MediaStream>);

    /// Which of the optional hooks below are implemented
    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    /// Drop the stream; defaults to `set_stream(None)`
    fn clear_stream(&mut self) {
        self.set_stream(None);
    }

    fn start(&mut self) {}

    fn stop(&mut self) {}

    fn on_stream_start(&mut self) {}

    fn on_stream_stop(&mut self) {}

    fn on_stream_error(&mut self, _error: &SessionError) {}
}

/// Passive playback surface
pub trait PlaybackElement: Send {
    /// Point the element at the stream
    fn attach(&mut self, stream: &MediaStream);

    /// Begin playback of the attached stream
    fn play(&mut self) -> Result<(), MediaError>;

    /// Drop any reference to the stream
    fn detach(&mut self);
}

/// The sink an acquired stream is routed to
pub enum StreamTarget {
    Element(Box<dyn PlaybackElement>),
    Handler(Box<dyn StreamHandler>),
}

impl StreamTarget {
    pub fn element(element: impl PlaybackElement + 'static) -> Self {
        StreamTarget::Element(Box::new(element))
    }

    pub fn handler(handler: impl StreamHandler + 'static) -> Self {
        StreamTarget::Handler(Box::new(handler))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StreamTarget::Element(_) => "element",
            StreamTarget::Handler(_) => "handler",
        }
    }

    /// Route a freshly opened stream to the target
    pub(crate) fn deliver(&mut self, stream: &MediaStream) -> Result<(), MediaError> {
        match self {
            StreamTarget::Element(element) => {
                element.attach(stream);
                let played = element.play();
                if played.is_err() {
                    element.detach();
                }
                played
            }
            StreamTarget::Handler(handler) => {
                let caps = handler.capabilities();
                handler.set_stream(Some(stream));
                if caps.start {
                    handler.start();
                }
                if caps.on_stream_start {
                    handler.on_stream_start();
                }
                Ok(())
            }
        }
    }

    /// Tell the target its stream is gone
    pub(crate) fn release(&mut self) {
        match self {
            StreamTarget::Element(element) => element.detach(),
            StreamTarget::Handler(handler) => {
                let caps = handler.capabilities();
                handler.clear_stream();
                if caps.stop {
                    handler.stop();
                }
                if caps.on_stream_stop {
                    handler.on_stream_stop();
                }
            }
        }
    }

    /// Forward an error to the target, if it listens for them
    pub(crate) fn report_error(&mut self, error: &SessionError) {
        match self {
            StreamTarget::Handler(handler) if handler.capabilities().on_stream_error => {
                handler.on_stream_error(error);
            }
            _ => debug!("Stream target does not handle errors: {}", error),
        }
    }
}

impl std::fmt::Debug for StreamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StreamTarget").field(&self.kind()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::broadcast;

    struct Logged(Arc<Mutex<Vec<&'static str>>>);

    impl StreamHandler for Logged {
        fn set_stream(&mut self, stream: Option<&MediaStream>) {
            let call = if stream.is_some() { "set" } else { "unset" };
            self.0.lock().unwrap().push(call);
        }

        fn clear_stream(&mut self) {
            self.0.lock().unwrap().push("clear");
        }
    }

    #[test]
    fn test_release_goes_through_clear_stream() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut target = StreamTarget::handler(Logged(Arc::clone(&log)));
        let (tx, _) = broadcast::channel(1);
        let stream = MediaStream::new("mic", 16000, tx);

        target.deliver(&stream).unwrap();
        target.release();

        assert_eq!(*log.lock().unwrap(), vec!["set", "clear"]);
    }
}
