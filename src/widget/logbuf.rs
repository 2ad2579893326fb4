//! Shared in-memory log sink
//!
//! [`LogBuffer`] captures whatever the embedder's `tracing` subscriber
//! writes during a run. The step heartbeat carries only the delta since
//! the previous step; the completion snapshot flushes and clears the
//! whole buffer. Wire it up as a `MakeWriter`:
//!
//! ```ignore
//! let log = LogBuffer::new();
//! let subscriber = tracing_subscriber::fmt()
//!     .with_writer(log.clone())
//!     .finish();
//! ```

use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Default)]
struct LogState {
    text: String,
    /// Offset of the first byte not yet reported by `delta`
    mark: usize,
}

/// Cheaply cloneable handle to one shared log buffer
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    inner: Arc<Mutex<LogState>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text directly (the `io::Write` path does this too)
    pub fn append(&self, text: &str) {
        if let Ok(mut state) = self.inner.lock() {
            state.text.push_str(text);
        }
    }

    /// Text accumulated since the previous `delta` call
    pub fn delta(&self) -> String {
        match self.inner.lock() {
            Ok(mut state) => {
                let delta = state.text[state.mark..].to_string();
                state.mark = state.text.len();
                delta
            }
            Err(_) => String::new(),
        }
    }

    /// Full contents; clears the buffer and the delta mark
    pub fn take_all(&self) -> String {
        match self.inner.lock() {
            Ok(mut state) => {
                state.mark = 0;
                std::mem::take(&mut state.text)
            }
            Err(_) => String::new(),
        }
    }

    /// Full contents without consuming anything
    pub fn contents(&self) -> String {
        self.inner
            .lock()
            .map(|state| state.text.clone())
            .unwrap_or_default()
    }
}

/// `io::Write` adapter handed out per log event
pub struct LogWriter {
    buffer: LogBuffer,
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.append(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            buffer: self.clone(),
        }
    }
}
