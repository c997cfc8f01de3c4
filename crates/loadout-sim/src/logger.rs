//! Decision Log
//!
//! Appends every engine event as one JSON line.

use bevy_ecs::prelude::*;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use loadout_events::EngineEvent;

/// JSONL sink for engine events
#[derive(Resource)]
pub struct DecisionLogger {
    writer: Option<BufWriter<File>>,
    event_count: u64,
    swap_count: u64,
}

impl DecisionLogger {
    /// Create a logger writing to `path`, creating parent directories.
    pub fn new<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            event_count: 0,
            swap_count: 0,
        })
    }

    /// A logger that counts events but writes nothing
    pub fn null() -> Self {
        Self {
            writer: None,
            event_count: 0,
            swap_count: 0,
        }
    }

    pub fn log(&mut self, event: &EngineEvent) -> io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            let json = event
                .to_jsonl()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            writeln!(writer, "{}", json)?;
        }
        self.event_count += 1;
        if event.is_swap() {
            self.swap_count += 1;
        }
        Ok(())
    }

    pub fn log_batch(&mut self, events: &[EngineEvent]) -> io::Result<()> {
        for event in events {
            self.log(event)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn swap_count(&self) -> u64 {
        self.swap_count
    }
}

impl Drop for DecisionLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            eprintln!("Error flushing decision log: {}", e);
        }
    }
}
