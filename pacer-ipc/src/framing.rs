//! Length-Prefixed Frame Encoding
//!
//! Provides reliable message boundaries over stream-based IPC (an inherited
//! pipe pair, or stdin/stdout as a fallback).

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{BufReader, BufWriter, Read, Write};
use thiserror::Error;

/// Maximum frame size (16 MB) to prevent memory exhaustion
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Errors that can occur during frame encoding/decoding
#[derive(Debug, Error)]
pub enum FrameError {
    /// Underlying read or write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The message could not be encoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The payload could not be decoded into the expected type
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Declared payload length exceeds [`MAX_FRAME_SIZE`]
    #[error("frame too large: {size} bytes (max {max} bytes)")]
    FrameTooLarge {
        /// Declared payload size
        size: usize,
        /// Allowed maximum
        max: usize,
    },

    /// The frame header or payload was malformed
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// The peer closed the stream between frames
    #[error("end of stream")]
    EndOfStream,
}

/// Write a message with length prefix to a writer.
///
/// Frame format:
/// ```text
/// +----------------+------------------+
/// | length (4 LE)  | JSON payload     |
/// +----------------+------------------+
/// ```
pub fn write_frame<W, T>(writer: &mut BufWriter<W>, message: &T) -> Result<(), FrameError>
where
    W: Write,
    T: Serialize,
{
    let bytes = serde_json::to_vec(message).map_err(|e| FrameError::Serialization(e.to_string()))?;

    let len = bytes.len();
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    writer.write_all(&(len as u32).to_le_bytes())?;
    writer.write_all(&bytes)?;

    // Flush to ensure message is sent
    writer.flush()?;

    Ok(())
}

/// Read a message with length prefix from a reader.
pub fn read_frame<R, T>(reader: &mut BufReader<R>) -> Result<T, FrameError>
where
    R: Read,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::EndOfStream);
        }
        Err(e) => return Err(FrameError::Io(e)),
    }

    let len = u32::from_le_bytes(len_buf) as usize;

    if len > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    if len == 0 {
        return Err(FrameError::InvalidFrame("zero-length frame".to_string()));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;

    serde_json::from_slice(&buf).map_err(|e| FrameError::Deserialization(e.to_string()))
}

/// Frame writer wrapper for convenient message sending
pub struct FrameWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> FrameWriter<W> {
    /// Create a new frame writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(64 * 1024, writer),
        }
    }

    /// Write a message
    pub fn write<T>(&mut self, message: &T) -> Result<(), FrameError>
    where
        T: Serialize,
    {
        write_frame(&mut self.writer, message)
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> Result<(), FrameError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Frame reader wrapper for convenient message receiving
pub struct FrameReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    /// Create a new frame reader
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(64 * 1024, reader),
        }
    }

    /// Read a message
    pub fn read<T>(&mut self) -> Result<T, FrameError>
    where
        T: DeserializeOwned,
    {
        read_frame(&mut self.reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Cursor;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestMessage {
        value: u64,
        text: String,
    }

    #[test]
    fn test_roundtrip() {
        let original = TestMessage {
            value: 42,
            text: "hello world".to_string(),
        };

        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            writer.write(&original).unwrap();
        }

        let mut reader = FrameReader::new(Cursor::new(buffer));
        let decoded: TestMessage = reader.read().unwrap();

        assert_eq!(original, decoded);
    }

    #[test]
    fn test_multiple_messages() {
        let messages = vec![
            TestMessage {
                value: 1,
                text: "first".to_string(),
            },
            TestMessage {
                value: 2,
                text: "second".to_string(),
            },
            TestMessage {
                value: 3,
                text: "third".to_string(),
            },
        ];

        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            for msg in &messages {
                writer.write(msg).unwrap();
            }
        }

        let mut reader = FrameReader::new(Cursor::new(buffer));
        for expected in &messages {
            let decoded: TestMessage = reader.read().unwrap();
            assert_eq!(expected, &decoded);
        }
    }

    #[test]
    fn test_end_of_stream() {
        let buffer: Vec<u8> = Vec::new();
        let mut reader = FrameReader::new(Cursor::new(buffer));
        let result: Result<TestMessage, _> = reader.read();
        assert!(matches!(result, Err(FrameError::EndOfStream)));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        // Hand-craft a header declaring a payload larger than the cap.
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&((MAX_FRAME_SIZE as u32) + 1).to_le_bytes());
        let mut reader = FrameReader::new(Cursor::new(buffer));
        let result: Result<TestMessage, _> = reader.read();
        assert!(matches!(result, Err(FrameError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_zero_length_frame_rejected() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&0u32.to_le_bytes());
        let mut reader = FrameReader::new(Cursor::new(buffer));
        let result: Result<TestMessage, _> = reader.read();
        assert!(matches!(result, Err(FrameError::InvalidFrame(_))));
    }
}
