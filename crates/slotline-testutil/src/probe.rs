//! Start/finish recording for probe jobs.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use slotline_types::JobId;

/// Something that happened to a probe job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Started(JobId),
    Finished(JobId),
}

/// Shared, append-only log of probe events in the order they happened.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: Event) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Job positions in the order they started.
    pub fn starts(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started(id) => Some(id.index()),
                Event::Finished(_) => None,
            })
            .collect()
    }

    /// Job positions in the order they finished.
    pub fn finishes(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Finished(id) => Some(id.index()),
                Event::Started(_) => None,
            })
            .collect()
    }

    /// How many jobs had finished when `index` started, if it did.
    pub fn finished_before_start(&self, index: usize) -> Option<usize> {
        let events = self.events();
        let pos = events
            .iter()
            .position(|e| *e == Event::Started(JobId(index)))?;
        Some(
            events[..pos]
                .iter()
                .filter(|e| matches!(e, Event::Finished(_)))
                .count(),
        )
    }

    /// Highest number of jobs that were between start and finish at once.
    pub fn max_in_flight(&self) -> usize {
        let mut current = 0usize;
        let mut peak = 0usize;
        for event in self.events() {
            match event {
                Event::Started(_) => {
                    current += 1;
                    peak = peak.max(current);
                }
                Event::Finished(_) => current = current.saturating_sub(1),
            }
        }
        peak
    }

    /// A job that records its start when admitted, sleeps for `delay`, records
    /// its finish and returns its own position.
    ///
    /// The start is recorded by the closure itself, which the scheduler runs
    /// at admission time.
    pub fn probe(
        &self,
        index: usize,
        delay: Duration,
    ) -> impl FnOnce() -> Pin<Box<dyn Future<Output = usize> + Send>> + Send + use<> {
        let log = self.clone();
        move || {
            log.record(Event::Started(JobId(index)));
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                log.record(Event::Finished(JobId(index)));
                index
            })
        }
    }
}
