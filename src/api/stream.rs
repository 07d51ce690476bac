//! TutorialStream: lazy, cancellable sequence of decoded tutorial chunks.
//!
//! Wraps the raw response body. Each call to `next` either hands out a chunk
//! that is already decoded or suspends on the next network read. The
//! cancellation token is checked before every delivery and raced against
//! every read, so once it fires no further chunk is handed out and the body
//! is dropped, closing the connection.

use super::streaming::ChunkDecoder;
use super::types::TutorialChunk;
use crate::error::Error;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;

/// Raw response body, one item per network read.
pub type ByteStream = BoxStream<'static, Result<Bytes, Error>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    /// Transport closed cleanly; draining what the decoder already produced.
    Draining,
    Done,
}

pub struct TutorialStream {
    body: ByteStream,
    decoder: ChunkDecoder,
    pending: VecDeque<TutorialChunk>,
    cancel: CancellationToken,
    phase: Phase,
    reads: usize,
}

impl TutorialStream {
    pub fn new(body: ByteStream, cancel: CancellationToken) -> Self {
        Self {
            body,
            decoder: ChunkDecoder::new(),
            pending: VecDeque::new(),
            cancel,
            phase: Phase::Open,
            reads: 0,
        }
    }

    /// Network reads consumed so far.
    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Next chunk in delivery order.
    ///
    /// `None` after a clean close. `Some(Err(Error::Cancelled))` or
    /// `Some(Err(Error::Stream(_)))` end the sequence abnormally; every call
    /// after that returns `None`.
    pub async fn next(&mut self) -> Option<Result<TutorialChunk, Error>> {
        loop {
            if self.phase == Phase::Done {
                return None;
            }
            if self.cancel.is_cancelled() {
                return Some(Err(self.stop(Error::Cancelled)));
            }
            if let Some(chunk) = self.pending.pop_front() {
                return Some(Ok(chunk));
            }
            if self.phase == Phase::Draining {
                self.phase = Phase::Done;
                return None;
            }

            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => continue,
                read = self.body.next() => read,
            };

            match read {
                Some(Ok(bytes)) => {
                    self.reads += 1;
                    self.pending.extend(self.decoder.push(&bytes));
                }
                Some(Err(e)) => {
                    log::error!("[STREAM] Transport failed after {} reads: {}", self.reads, e);
                    return Some(Err(self.stop(e)));
                }
                None => {
                    self.pending.extend(self.decoder.finish());
                    self.phase = Phase::Draining;
                }
            }
        }
    }

    /// Drain the whole stream into a vector. Stops at the first error.
    pub async fn collect_chunks(mut self) -> Result<Vec<TutorialChunk>, Error> {
        let mut chunks = Vec::new();
        while let Some(item) = self.next().await {
            chunks.push(item?);
        }
        Ok(chunks)
    }

    /// Terminal transition: drop the body so the connection closes.
    fn stop(&mut self, err: Error) -> Error {
        self.phase = Phase::Done;
        self.pending.clear();
        self.body = futures::stream::empty().boxed();
        err
    }
}

impl std::fmt::Debug for TutorialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TutorialStream")
            .field("phase", &self.phase)
            .field("reads", &self.reads)
            .field("pending", &self.pending.len())
            .finish()
    }
}
