//! Sink
//!
//! Bounded handoff of sealed pages from the task scanning a backend to the
//! task writing responses.
//!
//! - The producer owns a `Sink` and fills it row by row. When the traffic
//!   tracker reports a full page, the page is sealed and queued; queuing
//!   suspends while `prefetch_queue_capacity` pages are already waiting.
//! - The consumer owns the `SinkReceiver` and drains pages in FIFO order,
//!   followed by exactly one terminal event.
//! - Dropping or closing the receiver cancels the producer at its next row
//!   or queue boundary; the unsealed page is discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::acceptor::Acceptor;
use super::buffer_factory::ColumnarBufferFactory;
use super::columnar_buffer::ColumnarBuffer;
use super::read_limiter::ReadLimiter;
use super::row_transformer::RowTransformer;
use super::traffic_tracker::TrafficTracker;
use crate::api::{ConnectorError, ConnectorResult, PagePayload, ReadStats};
use crate::config::PagingConfig;

/// A sealed page
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub payload: PagePayload,
    /// Counters of this page
    pub stats: ReadStats,
    /// Counters of the split up to and including this page
    pub total: ReadStats,
}

#[derive(Debug)]
enum SinkMessage {
    Page(Page),
    Terminal(ConnectorResult<()>),
}

/// What the consumer observes
#[derive(Debug)]
pub enum SinkEvent {
    Page(Page),
    Finished,
    Failed(ConnectorError),
}

/// Producer-side state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Operational,
    Finished,
    Failed,
}

/// Creates the queue of one split read
pub fn sink_channel(
    buffer_factory: ColumnarBufferFactory,
    paging: PagingConfig,
    read_limiter: ReadLimiter,
) -> (SinkFactory, SinkReceiver) {
    let (sender, receiver) = mpsc::channel(paging.prefetch_queue_capacity.max(1));
    let factory = SinkFactory {
        buffer_factory: Arc::new(buffer_factory),
        paging,
        read_limiter,
        queue: sender,
        sink_made: AtomicBool::new(false),
        sink_finished: Arc::new(AtomicBool::new(false)),
    };
    let receiver = SinkReceiver {
        queue: receiver,
        closed: false,
    };
    (factory, receiver)
}

/// Hands out the sink of one split read and reports its terminal outcome
pub struct SinkFactory {
    buffer_factory: Arc<ColumnarBufferFactory>,
    paging: PagingConfig,
    read_limiter: ReadLimiter,
    queue: mpsc::Sender<SinkMessage>,
    sink_made: AtomicBool,
    sink_finished: Arc<AtomicBool>,
}

impl SinkFactory {
    /// Builds the sink; a split read gets exactly one
    pub fn make_sink(&self) -> ConnectorResult<Sink> {
        if self.sink_made.swap(true, Ordering::AcqRel) {
            return Err(ConnectorError::invariant("sink already created for this split"));
        }
        Ok(Sink {
            buffer: self.buffer_factory.make_buffer(),
            tracker: TrafficTracker::new(&self.paging),
            read_limiter: self.read_limiter.clone(),
            queue: self.queue.clone(),
            state: SinkState::Operational,
            pages_sent: 0,
            finished: self.sink_finished.clone(),
        })
    }

    /// Whether the consumer went away
    pub fn is_cancelled(&self) -> bool {
        self.queue.is_closed()
    }

    /// Delivers the terminal event after the data source returned.
    ///
    /// A successful read that never created a sink still yields one empty
    /// page so the caller learns the schema.
    pub async fn finish(self, result: ConnectorResult<()>) {
        let outcome = match result {
            Ok(()) => self.complete().await,
            Err(err) => Err(err),
        };
        // A closed queue means the consumer is gone and nobody awaits the outcome
        let _ = self.queue.send(SinkMessage::Terminal(outcome)).await;
    }

    async fn complete(&self) -> ConnectorResult<()> {
        if !self.sink_made.load(Ordering::Acquire) {
            return self.make_sink()?.finish().await;
        }
        if !self.sink_finished.load(Ordering::Acquire) {
            return Err(ConnectorError::invariant(
                "data source returned without finishing its sink",
            ));
        }
        Ok(())
    }
}

/// Producer side of one split read
pub struct Sink {
    buffer: Box<dyn ColumnarBuffer>,
    tracker: TrafficTracker,
    read_limiter: ReadLimiter,
    queue: mpsc::Sender<SinkMessage>,
    state: SinkState,
    pages_sent: u64,
    finished: Arc<AtomicBool>,
}

impl Sink {
    pub fn state(&self) -> SinkState {
        self.state
    }

    /// Appends the transformer's current row, flushing the page first when
    /// the row would not fit.
    pub async fn add_row<A: Acceptor>(
        &mut self,
        transformer: &RowTransformer<A>,
    ) -> ConnectorResult<()> {
        self.ensure_operational()?;
        let result = self.accept(transformer).await;
        if result.is_err() {
            self.state = SinkState::Failed;
        }
        result
    }

    async fn accept<A: Acceptor>(&mut self, transformer: &RowTransformer<A>) -> ConnectorResult<()> {
        if self.queue.is_closed() {
            return Err(ConnectorError::Cancelled);
        }

        self.read_limiter.add_row()?;

        if !self.tracker.try_add_row(transformer.acceptors())? {
            self.flush().await?;
            if !self.tracker.try_add_row(transformer.acceptors())? {
                return Err(ConnectorError::invariant("row does not fit into an empty page"));
            }
        }

        transformer.append_to_buffer(self.buffer.as_mut())
    }

    /// Seals the final page. Emits an empty page when nothing was sent yet.
    pub async fn finish(mut self) -> ConnectorResult<()> {
        self.ensure_operational()?;
        if self.buffer.rows() > 0 || self.pages_sent == 0 {
            if let Err(err) = self.flush().await {
                self.state = SinkState::Failed;
                return Err(err);
            }
        }
        self.state = SinkState::Finished;
        self.finished.store(true, Ordering::Release);
        Ok(())
    }

    async fn flush(&mut self) -> ConnectorResult<()> {
        let payload = self.buffer.seal()?;
        let page = Page {
            payload,
            stats: self.tracker.page_stats(),
            total: self.tracker.total_stats(),
        };
        self.queue
            .send(SinkMessage::Page(page))
            .await
            .map_err(|_| ConnectorError::Cancelled)?;
        self.pages_sent += 1;
        self.tracker.refresh();
        Ok(())
    }

    fn ensure_operational(&self) -> ConnectorResult<()> {
        match self.state {
            SinkState::Operational => Ok(()),
            state => Err(ConnectorError::invariant(format!(
                "sink is not operational: {:?}",
                state
            ))),
        }
    }
}

/// Consumer side of one split read
pub struct SinkReceiver {
    queue: mpsc::Receiver<SinkMessage>,
    closed: bool,
}

impl SinkReceiver {
    /// Next page, then one terminal event, then `None`
    pub async fn next(&mut self) -> Option<SinkEvent> {
        if self.closed {
            return None;
        }
        let event = match self.queue.recv().await {
            Some(SinkMessage::Page(page)) => return Some(SinkEvent::Page(page)),
            Some(SinkMessage::Terminal(Ok(()))) => SinkEvent::Finished,
            Some(SinkMessage::Terminal(Err(err))) => SinkEvent::Failed(err),
            None => SinkEvent::Failed(ConnectorError::internal(
                "page producer stopped without a terminal signal",
            )),
        };
        self.close();
        Some(event)
    }

    /// Releases the queue; idempotent
    pub fn close(&mut self) {
        if !self.closed {
            self.queue.close();
            self.closed = true;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
