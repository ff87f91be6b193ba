//! Output channels for vendor actions.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{CoreError, CoreResult};

pub trait Sink: Send + Sync {
    fn deliver(&self, line: &str) -> CoreResult<()>;
}

/// Writes each line to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn deliver(&self, line: &str) -> CoreResult<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}").map_err(|e| CoreError::action_failed("stdout", e.to_string()))
    }
}

/// Keeps delivered lines in memory. Can be switched to reject deliveries.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
    rejecting: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl Sink for MemorySink {
    fn deliver(&self, line: &str) -> CoreResult<()> {
        if self.rejecting.load(Ordering::Relaxed) {
            return Err(CoreError::action_failed("memory_sink", "delivery rejected"));
        }

        self.lines.lock().push(line.to_string());
        Ok(())
    }
}
