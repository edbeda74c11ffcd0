//! Output buffers: carry a node's stdout to the nodes piped from it
//!
//! Each buffer has one producer and a fixed set of declared consumers. Every
//! consumer gets its own unbounded crossbeam channel, so the producer never
//! blocks on a slow reader and fan-out needs no shared cursor. Data may be
//! kept gzip-compressed while in flight; readers decompress transparently.

use crossbeam_channel::{unbounded, Receiver, Sender};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// How bytes are stored while they sit in the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

impl Compression {
    pub fn from_flag(gzip: bool) -> Self {
        if gzip {
            Compression::Gzip
        } else {
            Compression::None
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("node '{consumer}' is not a declared consumer of '{producer}'")]
    UnknownConsumer { producer: String, consumer: String },

    #[error("output of '{producer}' was already taken by '{consumer}'")]
    AlreadyTaken { producer: String, consumer: String },

    #[error("output of '{producer}' has been released")]
    Released { producer: String },
}

#[derive(Debug, Default)]
struct Counters {
    raw: AtomicU64,
    stored: AtomicU64,
}

/// Byte counters of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStats {
    /// Bytes the producer wrote
    pub raw_bytes: u64,
    /// Bytes held in flight after compression (per consumer)
    pub stored_bytes: u64,
}

/// Broadcasts chunks to every consumer channel that is still connected
struct Broadcast {
    senders: Vec<Sender<Vec<u8>>>,
    counters: Arc<Counters>,
}

impl Write for Broadcast {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        // A disconnected receiver means the consumer was released or is
        // gone; its share is dropped.
        self.senders.retain(|tx| tx.send(buf.to_vec()).is_ok());
        self.counters
            .stored
            .fetch_add(buf.len() as u64, Ordering::Relaxed);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

enum Sink {
    Plain(Broadcast),
    Gzip(GzEncoder<Broadcast>),
}

/// Producer side of a buffer
///
/// Closing (explicitly or on drop) disconnects every channel, which readers
/// see as end of stream.
pub struct OutputWriter {
    producer: String,
    sink: Option<Sink>,
    counters: Arc<Counters>,
}

impl OutputWriter {
    pub fn producer(&self) -> &str {
        &self.producer
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    /// Finish the stream. Idempotent.
    pub fn close(&mut self) -> io::Result<()> {
        match self.sink.take() {
            Some(Sink::Plain(_)) | None => Ok(()),
            Some(Sink::Gzip(encoder)) => encoder.finish().map(drop),
        }
    }
}

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = match self.sink.as_mut() {
            Some(Sink::Plain(b)) => b.write(buf)?,
            Some(Sink::Gzip(e)) => e.write(buf)?,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    format!("output buffer of '{}' is closed", self.producer),
                ))
            }
        };
        self.counters
            .raw
            .fetch_add(written as u64, Ordering::Relaxed);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.sink.as_mut() {
            Some(Sink::Plain(b)) => b.flush(),
            Some(Sink::Gzip(e)) => e.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for OutputWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(producer = %self.producer, error = %e, "failed to finish output buffer");
        }
    }
}

/// Consumer side registry of a buffer, owned by the scheduler
pub struct OutputBuffer {
    producer: String,
    compression: Compression,
    /// `None` once the consumer took its reader
    streams: HashMap<String, Option<Receiver<Vec<u8>>>>,
    released: bool,
    counters: Arc<Counters>,
}

impl OutputBuffer {
    /// Create a buffer for `producer` with one stream per consumer.
    pub fn open<I, S>(
        producer: impl Into<String>,
        compression: Compression,
        consumers: I,
    ) -> (OutputWriter, OutputBuffer)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let producer = producer.into();
        let counters = Arc::new(Counters::default());
        let mut senders = Vec::new();
        let mut streams = HashMap::new();

        for consumer in consumers {
            let (tx, rx) = unbounded();
            senders.push(tx);
            streams.insert(consumer.into(), Some(rx));
        }

        let broadcast = Broadcast {
            senders,
            counters: Arc::clone(&counters),
        };
        let sink = match compression {
            Compression::None => Sink::Plain(broadcast),
            Compression::Gzip => Sink::Gzip(GzEncoder::new(broadcast, flate2::Compression::default())),
        };

        let writer = OutputWriter {
            producer: producer.clone(),
            sink: Some(sink),
            counters: Arc::clone(&counters),
        };
        let buffer = OutputBuffer {
            producer,
            compression,
            streams,
            released: false,
            counters,
        };
        (writer, buffer)
    }

    pub fn producer(&self) -> &str {
        &self.producer
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Take `consumer`'s stream. Works before, during or after production.
    pub fn reader(&mut self, consumer: &str) -> Result<BufferReader, BufferError> {
        if self.released {
            return Err(BufferError::Released {
                producer: self.producer.clone(),
            });
        }
        let slot = self
            .streams
            .get_mut(consumer)
            .ok_or_else(|| BufferError::UnknownConsumer {
                producer: self.producer.clone(),
                consumer: consumer.to_string(),
            })?;
        let rx = slot.take().ok_or_else(|| BufferError::AlreadyTaken {
            producer: self.producer.clone(),
            consumer: consumer.to_string(),
        })?;

        let channel = ChannelReader {
            rx,
            chunk: Vec::new(),
            pos: 0,
        };
        let inner = match self.compression {
            Compression::None => ReaderInner::Plain(channel),
            Compression::Gzip => ReaderInner::Gzip(GzDecoder::new(channel)),
        };
        Ok(BufferReader { inner })
    }

    /// Drop every stream nobody took. Later writes for them are discarded.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        let untaken = self.streams.values().filter(|s| s.is_some()).count();
        for slot in self.streams.values_mut() {
            *slot = None;
        }
        self.released = true;
        tracing::debug!(producer = %self.producer, untaken, "output buffer released");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            raw_bytes: self.counters.raw.load(Ordering::Relaxed),
            stored_bytes: self.counters.stored.load(Ordering::Relaxed),
        }
    }
}

struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.chunk.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                // Producer closed and every chunk was drained
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

enum ReaderInner {
    Plain(ChannelReader),
    Gzip(GzDecoder<ChannelReader>),
}

/// Consumer side stream of one buffer; yields the producer's raw bytes.
pub struct BufferReader {
    inner: ReaderInner,
}

impl Read for BufferReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            ReaderInner::Plain(r) => r.read(buf),
            ReaderInner::Gzip(r) => r.read(buf),
        }
    }
}
