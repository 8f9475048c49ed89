// src/scanner.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, info, info_span, warn};

use crate::errors::ExtractionError;
use crate::extract::{Progress, ReceiptImage, TextExtractor};

/// Identifies one submitted extraction.
pub type Ticket = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum ScanStatus {
    Idle,
    Running { ticket: Ticket, progress: u8 },
    Done { ticket: Ticket, elapsed: Duration },
    Failed { ticket: Ticket, message: String },
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running { ticket, progress } => write!(f, "#{ticket} running ({progress}%)"),
            Self::Done { ticket, elapsed } => write!(f, "#{ticket} done in {}ms", elapsed.as_millis()),
            Self::Failed { ticket, message } => write!(f, "#{ticket} failed: {message}"),
        }
    }
}

struct InFlight {
    ticket: Ticket,
    handle: JoinHandle<Result<String, ExtractionError>>,
    progress: watch::Receiver<u8>,
    started: Instant,
}

/// Runs one extraction at a time. Submitting a new image cancels whatever
/// is still in flight, and results for older tickets are never delivered.
pub struct Scanner {
    extractor: Arc<dyn TextExtractor>,
    next_ticket: Ticket,
    current: Option<InFlight>,
    status: ScanStatus,
}

impl Scanner {
    pub fn new(extractor: Arc<dyn TextExtractor>) -> Self {
        Self {
            extractor,
            next_ticket: 1,
            current: None,
            status: ScanStatus::Idle,
        }
    }

    pub fn submit(&mut self, image: ReceiptImage) -> Ticket {
        if let Some(stale) = self.current.take() {
            stale.handle.abort();
            info!(ticket = stale.ticket, "Cancelled stale extraction");
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let (tx, rx) = watch::channel(0);
        let extractor = Arc::clone(&self.extractor);
        let span = info_span!("extract", ticket, file = %image.file_name);
        let handle = tokio::spawn(
            async move {
                let progress = Progress::new(tx);
                extractor.extract(&image, &progress).await
            }
            .instrument(span),
        );

        self.current = Some(InFlight {
            ticket,
            handle,
            progress: rx,
            started: Instant::now(),
        });
        self.status = ScanStatus::Running { ticket, progress: 0 };
        ticket
    }

    pub fn status(&self) -> ScanStatus {
        match &self.current {
            Some(job) => ScanStatus::Running {
                ticket: job.ticket,
                progress: *job.progress.borrow(),
            },
            None => self.status.clone(),
        }
    }

    /// Wait for `ticket` to finish. A ticket that has been superseded (or
    /// already collected) yields [`ExtractionError::Superseded`].
    ///
    /// The job stays tracked until it completes, so dropping this future
    /// early loses nothing and a later `wait` picks the result up.
    pub async fn wait(&mut self, ticket: Ticket) -> Result<String, ExtractionError> {
        let Some(job) = self.current.as_mut().filter(|job| job.ticket == ticket) else {
            return Err(ExtractionError::Superseded);
        };
        let started = job.started;

        let joined = (&mut job.handle).await;
        self.current = None;
        let result = match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ExtractionError::Superseded),
            Err(e) => Err(ExtractionError::Recognition(format!("extraction task failed: {e}"))),
        };

        self.status = match &result {
            Ok(text) => {
                let elapsed = started.elapsed();
                info!(ticket, chars = text.len(), elapsed_ms = elapsed.as_millis() as u64, "Extraction finished");
                ScanStatus::Done { ticket, elapsed }
            }
            Err(e) => {
                warn!(ticket, error = %e, "Extraction failed");
                ScanStatus::Failed {
                    ticket,
                    message: e.to_string(),
                }
            }
        };
        result
    }
}
