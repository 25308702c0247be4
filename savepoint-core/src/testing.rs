//! Test doubles shared by the unit tests.

use crate::archiver::Archiver;
use crate::error::{ArchiveError, HostError};
use crate::notice::{Notice, Notifier};
use crate::quiesce::{FlushOptions, Host};
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Host(&'static str),
    Compress,
    Notice(Notice),
}

/// Shared event log; also a [`Notifier`]
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn host_calls(&self) -> Vec<&'static str> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Host(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Notice(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    /// Host calls and archive calls in order, notices left out
    pub fn timeline(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Host(call) => Some(call.to_string()),
                Event::Compress => Some("compress".to_string()),
                Event::Notice(_) => None,
            })
            .collect()
    }
}

impl Notifier for Recorder {
    fn notify(&self, notice: Notice) {
        self.push(Event::Notice(notice));
    }
}

pub struct RecordingHost {
    recorder: Recorder,
    fail_disable: bool,
    fail_flush: bool,
    /// When set, flush blocks until a message arrives
    release: Option<Mutex<mpsc::Receiver<()>>>,
}

impl RecordingHost {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            fail_disable: false,
            fail_flush: false,
            release: None,
        }
    }

    pub fn failing_disable(mut self) -> Self {
        self.fail_disable = true;
        self
    }

    pub fn failing_flush(mut self) -> Self {
        self.fail_flush = true;
        self
    }

    /// Flush waits until the returned sender fires (or is dropped)
    pub fn blocking_flush(mut self) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        self.release = Some(Mutex::new(rx));
        (self, tx)
    }
}

impl Host for RecordingHost {
    fn set_saving_disabled(&self, disabled: bool) -> Result<(), HostError> {
        self.recorder
            .push(Event::Host(if disabled { "disable" } else { "enable" }));
        if disabled && self.fail_disable {
            return Err(HostError::Rejected("read-only host".to_string()));
        }
        Ok(())
    }

    fn flush_all(&self, _options: FlushOptions) -> Result<(), HostError> {
        self.recorder.push(Event::Host("flush"));
        if let Some(release) = &self.release {
            let _ = release.lock().unwrap().recv();
        }
        if self.fail_flush {
            return Err(HostError::Rejected("disk full".to_string()));
        }
        Ok(())
    }
}

/// Writes a small placeholder file instead of a real archive
pub struct FakeArchiver {
    recorder: Recorder,
    fail: bool,
    panic: bool,
}

impl FakeArchiver {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            fail: false,
            panic: false,
        }
    }

    pub fn failing(recorder: Recorder) -> Self {
        Self {
            fail: true,
            ..Self::new(recorder)
        }
    }

    /// Panics mid-compress, taking the worker thread down
    pub fn panicking(recorder: Recorder) -> Self {
        Self {
            panic: true,
            ..Self::new(recorder)
        }
    }
}

impl Archiver for FakeArchiver {
    fn compress(&self, source: &Path, dest: &Path) -> Result<(), ArchiveError> {
        self.recorder.push(Event::Compress);
        if self.panic {
            panic!("archiver crashed while compressing {}", source.display());
        }
        if self.fail {
            return Err(ArchiveError::UnsupportedSource(source.to_path_buf()));
        }
        std::fs::write(dest, b"archive")?;
        Ok(())
    }
}
