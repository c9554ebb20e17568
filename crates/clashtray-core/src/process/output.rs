//! Bounded capture of a child's stdout/stderr.
//!
//! A long-running proxy writes logs for hours; only the last lines matter
//! for a failure notification, so each stream keeps a fixed-size tail.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// The last `max_lines` lines written to one stream.
#[derive(Debug)]
pub struct OutputTail {
    lines: VecDeque<String>,
    max_lines: usize,
}

impl OutputTail {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines: max_lines.max(1),
        }
    }

    pub fn push(&mut self, line: String) {
        if self.lines.len() == self.max_lines {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Drain the buffer into one newline-joined string.
    pub fn take(&mut self) -> String {
        self.lines.drain(..).collect::<Vec<_>>().join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Shared handle to a tail, written by a reader task and drained by the monitor.
#[derive(Debug, Clone)]
pub struct SharedTail(Arc<Mutex<OutputTail>>);

impl SharedTail {
    pub fn new(max_lines: usize) -> Self {
        Self(Arc::new(Mutex::new(OutputTail::new(max_lines))))
    }

    pub fn push(&self, line: String) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    pub fn take(&self) -> String {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Spawn a task copying `reader` line by line into `tail` until EOF.
pub fn spawn_capture<R>(
    runtime: &Handle,
    stream: &'static str,
    reader: R,
    tail: SharedTail,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    runtime.spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    trace!(stream, "{}", line);
                    tail.push(line);
                }
                Err(e) => {
                    debug!(stream, "Output capture stopped: {}", e);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_keeps_last_lines() {
        let mut tail = OutputTail::new(2);
        tail.push("one".into());
        tail.push("two".into());
        tail.push("three".into());
        assert_eq!(tail.take(), "two\nthree");
        assert!(tail.is_empty());
    }

    #[test]
    fn test_take_is_read_once() {
        let tail = SharedTail::new(10);
        tail.push("error: bad rule".into());
        assert_eq!(tail.take(), "error: bad rule");
        assert_eq!(tail.take(), "");
    }

    #[tokio::test]
    async fn test_capture_reads_until_eof() {
        let tail = SharedTail::new(10);
        let input: &'static [u8] = b"first\r\nsecond\nthird";
        spawn_capture(&Handle::current(), "stdout", input, tail.clone())
            .await
            .unwrap();
        assert_eq!(tail.take(), "first\nsecond\nthird");
    }
}
