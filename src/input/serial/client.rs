//! Serial line source: opens the device and yields complete text lines.

use crate::config::SerialConfig;
use crate::error::{BridgeError, Result};
use log::{debug, info, warn};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, BufRead, BufReader};
use std::time::Duration;

/// How long a single serial read waits before returning `TimedOut`.
///
/// This is only the polling granularity of the blocking read. A timeout is
/// treated as "no data yet" and never ends the line sequence.
const READ_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Something that can be (re)opened as a stream of text lines.
///
/// Each successful `open` yields a fresh reader. Readers are not
/// restartable: once [`read_lines`] ends, the caller opens a new one.
pub trait LineSource: Send {
    type Reader: BufRead;

    /// Human readable name for logs (device path, test label, ...).
    fn name(&self) -> &str;

    /// Open the underlying connection.
    ///
    /// Failures are reported as [`BridgeError::ConnectionFailed`]; retrying is
    /// up to the caller.
    fn open(&mut self) -> Result<Self::Reader>;
}

/// Serial port line source (8N1, no flow control).
pub struct SerialSource {
    port_name: String,
    baud_rate: u32,
}

impl SerialSource {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
        }
    }

    pub fn from_config(config: &SerialConfig) -> Self {
        Self::new(config.port_name.clone(), config.baud_rate)
    }
}

impl LineSource for SerialSource {
    type Reader = BufReader<Box<dyn SerialPort>>;

    fn name(&self) -> &str {
        &self.port_name
    }

    fn open(&mut self) -> Result<Self::Reader> {
        let port = serialport::new(&self.port_name, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_POLL_INTERVAL)
            .open()
            .map_err(|e| BridgeError::ConnectionFailed {
                source_name: self.port_name.clone(),
                reason: e.to_string(),
            })?;

        info!(
            "[Serial] Opened serial port: {} at {} baud",
            self.port_name, self.baud_rate
        );

        Ok(BufReader::new(port))
    }
}

/// Iterate over the complete lines of an opened source.
pub fn read_lines<R: BufRead>(reader: R) -> LineReader<R> {
    LineReader {
        reader,
        buf: Vec::with_capacity(128),
        done: false,
    }
}

/// Lazy sequence of `\n`-terminated lines.
///
/// Ends (returns `None`) on end of stream or on an I/O error other than a
/// read timeout. A trailing line without its terminator is discarded. The
/// terminator and a preceding `\r` are stripped; invalid UTF-8 is replaced
/// lossily.
pub struct LineReader<R> {
    reader: R,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }

        loop {
            // read_until keeps already-read bytes in `buf` on error, so a
            // timeout mid-line just resumes the same line.
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    if !self.buf.is_empty() {
                        debug!(
                            "[Serial] Dropping {} byte partial line at end of stream",
                            self.buf.len()
                        );
                    }
                    break;
                }
                Ok(_) => {
                    if self.buf.last() != Some(&b'\n') {
                        // EOF in the middle of a line
                        debug!(
                            "[Serial] Dropping {} byte partial line at end of stream",
                            self.buf.len()
                        );
                        break;
                    }
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                    let line = String::from_utf8_lossy(&self.buf).into_owned();
                    self.buf.clear();
                    return Some(line);
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    warn!("[Serial] Error reading from line source: {}", e);
                    break;
                }
            }
        }

        self.done = true;
        self.buf.clear();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    /// Reader that replays a script of chunks and errors.
    struct Scripted {
        steps: Vec<io::Result<Vec<u8>>>,
    }

    impl Read for Scripted {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            if self.steps.is_empty() {
                return Ok(0);
            }
            match self.steps.remove(0) {
                Ok(chunk) => {
                    let n = chunk.len().min(out.len());
                    out[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.steps.insert(0, Ok(chunk[n..].to_vec()));
                    }
                    Ok(n)
                }
                Err(e) => Err(e),
            }
        }
    }

    #[test]
    fn test_complete_lines() {
        let lines: Vec<String> = read_lines(Cursor::new("0,0,0,1\n0.1,0.2,0.3,0.9\n")).collect();
        assert_eq!(lines, ["0,0,0,1", "0.1,0.2,0.3,0.9"]);
    }

    #[test]
    fn test_crlf_stripped() {
        let lines: Vec<String> = read_lines(Cursor::new("0,0,0,1\r\n\r\n")).collect();
        assert_eq!(lines, ["0,0,0,1", ""]);
    }

    #[test]
    fn test_partial_line_at_eof_dropped() {
        let lines: Vec<String> = read_lines(Cursor::new("0,0,0,1\n0.1,0.")).collect();
        assert_eq!(lines, ["0,0,0,1"]);
    }

    #[test]
    fn test_timeout_resumes_same_line() {
        let script = Scripted {
            steps: vec![
                Ok(b"0.1,0.2".to_vec()),
                Err(io::Error::new(io::ErrorKind::TimedOut, "poll")),
                Ok(b",0.3,0.9\n".to_vec()),
            ],
        };
        let lines: Vec<String> = read_lines(BufReader::new(script)).collect();
        assert_eq!(lines, ["0.1,0.2,0.3,0.9"]);
    }

    #[test]
    fn test_io_error_ends_sequence() {
        let script = Scripted {
            steps: vec![
                Ok(b"0,0,0,1\n".to_vec()),
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")),
                Ok(b"1,1,1,1\n".to_vec()),
            ],
        };
        let mut lines = read_lines(BufReader::new(script));
        assert_eq!(lines.next().as_deref(), Some("0,0,0,1"));
        assert_eq!(lines.next(), None);
        // Not restartable
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_open_missing_device_fails() {
        let mut source = SerialSource::new("/dev/quaternion-bridge-does-not-exist", 115200);
        match source.open() {
            Err(BridgeError::ConnectionFailed { source_name, .. }) => {
                assert_eq!(source_name, "/dev/quaternion-bridge-does-not-exist");
            }
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("opening a missing device succeeded"),
        }
    }
}
