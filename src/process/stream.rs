//! Stream pumps: drain a child's stdout/stderr into consumers

use std::io::{self, Read, Write};

use crate::buffer::OutputWriter;

/// Size of a single read from a child pipe
const CHUNK_SIZE: usize = 8192;

/// How a stream is delivered to its consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Split into lines, terminators stripped
    Text,
    /// Raw chunks as they arrive
    Binary,
}

impl StreamMode {
    pub fn from_flag(binary: bool) -> Self {
        if binary {
            StreamMode::Binary
        } else {
            StreamMode::Text
        }
    }
}

/// Receives the data of one process stream
pub trait StreamConsumer: Send {
    /// One line of a text stream, without its terminator
    fn consume_line(&mut self, line: &str);

    /// One raw chunk of a binary stream
    fn consume_bytes(&mut self, chunk: &[u8]);
}

/// Drain `reader` into `consumer` until end of stream.
///
/// Every raw byte is also copied into `tee`, which is closed once the
/// stream ends. A failing tee is reported once and then ignored, so the
/// pipe is always drained. Returns the number of bytes read.
pub fn pump<R, C>(
    mut reader: R,
    mode: StreamMode,
    consumer: &mut C,
    mut tee: Option<&mut OutputWriter>,
) -> io::Result<u64>
where
    R: Read,
    C: StreamConsumer + ?Sized,
{
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut pending: Vec<u8> = Vec::new();
    let mut total = 0u64;

    let result = loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(e),
        };
        total += n as u64;
        let data = &chunk[..n];

        if let Some(writer) = tee.as_deref_mut() {
            if let Err(e) = writer.write_all(data) {
                tracing::warn!(producer = %writer.producer(), error = %e, "output buffer write failed");
                tee = None;
            }
        }

        match mode {
            StreamMode::Binary => consumer.consume_bytes(data),
            StreamMode::Text => {
                pending.extend_from_slice(data);
                let mut start = 0;
                while let Some(pos) = pending[start..].iter().position(|&b| b == b'\n') {
                    emit_line(consumer, &pending[start..start + pos]);
                    start += pos + 1;
                }
                pending.drain(..start);
            }
        }
    };

    if mode == StreamMode::Text && !pending.is_empty() {
        emit_line(consumer, &pending);
    }
    if let Some(writer) = tee {
        if let Err(e) = writer.close() {
            tracing::warn!(producer = %writer.producer(), error = %e, "failed to close output buffer");
        }
    }

    result
}

fn emit_line<C: StreamConsumer + ?Sized>(consumer: &mut C, raw: &[u8]) {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    consumer.consume_line(&String::from_utf8_lossy(raw));
}
