use std::io::{self, BufRead, BufReader, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, error, info, warn};

use crate::error::LinkError;

/// Line-oriented byte stream to the sensor.
pub trait LineTransport {
    /// Blocks up to the read timeout. `Ok(None)` means no complete line arrived yet.
    fn read_line(&mut self) -> io::Result<Option<String>>;
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

/// Opens transports. Called once at startup and again on each reconnect.
pub trait Connector {
    type Transport: LineTransport;

    fn open(&mut self) -> io::Result<Self::Transport>;

    /// Human-readable endpoint name for logs.
    fn endpoint(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
    Reconnecting,
    /// Terminal.
    Failed,
}

/// Owns the sensor connection and applies the retry-once reconnect policy.
pub struct SerialLink<C: Connector> {
    connector: C,
    transport: Option<C::Transport>,
    state: LinkState,
}

impl<C: Connector> SerialLink<C> {
    /// Opens the endpoint. Failure here is fatal to the caller.
    pub fn open(mut connector: C) -> Result<Self, LinkError> {
        let transport = connector.open().map_err(|source| LinkError::Open {
            endpoint: connector.endpoint(),
            source,
        })?;
        info!("Opened serial endpoint {}", connector.endpoint());
        Ok(Self {
            connector,
            transport: Some(transport),
            state: LinkState::Connected,
        })
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// `Ok(None)` on timeout, or after a fault that was recovered by reconnecting.
    pub fn read_line(&mut self) -> Result<Option<String>, LinkError> {
        let result = match self.transport.as_mut() {
            Some(transport) if self.state == LinkState::Connected => transport.read_line(),
            _ => return Err(Self::not_connected()),
        };
        match result {
            Ok(line) => Ok(line),
            Err(fault) => {
                self.recover(fault)?;
                Ok(None)
            }
        }
    }

    /// Writes one outbound line. `Ok(false)` when a fault was recovered by
    /// reconnecting but the line itself was dropped.
    pub fn write_line(&mut self, line: &str) -> Result<bool, LinkError> {
        let result = match self.transport.as_mut() {
            Some(transport) if self.state == LinkState::Connected => transport.write_line(line),
            _ => return Err(Self::not_connected()),
        };
        match result {
            Ok(()) => Ok(true),
            Err(fault) => {
                self.recover(fault)?;
                Ok(false)
            }
        }
    }

    fn recover(&mut self, fault: io::Error) -> Result<(), LinkError> {
        warn!("{}. Reconnecting...", LinkError::from(fault));
        self.state = LinkState::Disconnected;
        self.transport = None;

        self.state = LinkState::Reconnecting;
        match self.connector.open() {
            Ok(transport) => {
                self.transport = Some(transport);
                self.state = LinkState::Connected;
                info!("Reconnected to {}", self.connector.endpoint());
                Ok(())
            }
            Err(source) => {
                error!("Failed to reconnect to {}: {}", self.connector.endpoint(), source);
                self.state = LinkState::Failed;
                Err(LinkError::Failed { source })
            }
        }
    }

    fn not_connected() -> LinkError {
        LinkError::Failed {
            source: io::Error::new(io::ErrorKind::NotConnected, "serial link is not connected"),
        }
    }

    /// Releases the connection. Further reads and writes fail.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!("Closed serial endpoint {}", self.connector.endpoint());
        }
        if self.state != LinkState::Failed {
            self.state = LinkState::Disconnected;
        }
    }
}

/// Hardware serial port settings.
#[derive(Debug, Clone)]
pub struct SerialPortConnector {
    pub path: String,
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl Connector for SerialPortConnector {
    type Transport = SerialPortTransport;

    fn open(&mut self) -> io::Result<SerialPortTransport> {
        let port = serialport::new(&self.path, self.baud_rate)
            .timeout(self.timeout)
            .open()
            .map_err(io::Error::from)?;
        SerialPortTransport::new(port)
    }

    fn endpoint(&self) -> String {
        format!("{} @ {} baud", self.path, self.baud_rate)
    }
}

/// Largest partial line kept across read timeouts.
pub const MAX_PENDING_LINE: usize = 4096;

/// Assembles newline-terminated lines from a reader with a read timeout.
///
/// Bytes without a newline are kept across timeouts until the line completes
/// or grows past `max_len`, in which case the partial line is discarded.
pub struct LineAssembler<R> {
    reader: R,
    pending: Vec<u8>,
    max_len: usize,
}

impl<R: BufRead> LineAssembler<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_len(reader, MAX_PENDING_LINE)
    }

    pub fn with_max_len(reader: R, max_len: usize) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            max_len,
        }
    }

    /// `Ok(None)` on timeout. End of stream is reported as `UnexpectedEof`.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        loop {
            let available = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "serial port closed"));
            }

            let (consumed, complete) = match available.iter().position(|b| *b == b'\n') {
                Some(i) => {
                    self.pending.extend_from_slice(&available[..=i]);
                    (i + 1, true)
                }
                None => {
                    self.pending.extend_from_slice(available);
                    (available.len(), false)
                }
            };
            self.reader.consume(consumed);

            if complete {
                let line = String::from_utf8_lossy(&self.pending).trim().to_string();
                self.pending.clear();
                return Ok(Some(line));
            }
            if self.pending.len() > self.max_len {
                warn!(
                    "Discarding {} bytes received without a line terminator",
                    self.pending.len()
                );
                self.pending.clear();
            }
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

pub struct SerialPortTransport {
    lines: LineAssembler<BufReader<Box<dyn SerialPort>>>,
    writer: Box<dyn SerialPort>,
}

impl SerialPortTransport {
    fn new(port: Box<dyn SerialPort>) -> io::Result<Self> {
        let writer = port.try_clone().map_err(io::Error::from)?;
        Ok(Self {
            lines: LineAssembler::new(BufReader::new(port)),
            writer,
        })
    }
}

impl LineTransport for SerialPortTransport {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.lines.read_line()
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        if !line.ends_with('\n') {
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()
    }
}

/// Serial ports visible to the OS.
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, serialport::Error> {
    serialport::available_ports()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    enum Step {
        Line(&'static str),
        Timeout,
        Fault,
        /// Makes the next write fail.
        WriteFault,
    }

    struct Scripted {
        steps: VecDeque<Step>,
        written: Vec<String>,
    }

    impl LineTransport for Scripted {
        fn read_line(&mut self) -> io::Result<Option<String>> {
            match self.steps.pop_front() {
                Some(Step::Line(l)) => Ok(Some(l.to_string())),
                Some(Step::Fault) => Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")),
                Some(Step::Timeout) | Some(Step::WriteFault) | None => Ok(None),
            }
        }

        fn write_line(&mut self, line: &str) -> io::Result<()> {
            if let Some(Step::WriteFault) = self.steps.front() {
                self.steps.pop_front();
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            self.written.push(line.to_string());
            Ok(())
        }
    }

    /// Each `open` hands out the next script; `Err` scripts fail the open.
    struct Opens(VecDeque<Result<Vec<Step>, ()>>);

    impl Connector for Opens {
        type Transport = Scripted;

        fn open(&mut self) -> io::Result<Scripted> {
            match self.0.pop_front() {
                Some(Ok(steps)) => Ok(Scripted {
                    steps: steps.into(),
                    written: Vec::new(),
                }),
                _ => Err(io::Error::new(io::ErrorKind::NotFound, "no such port")),
            }
        }

        fn endpoint(&self) -> String {
            "scripted".into()
        }
    }

    #[test]
    fn test_open_failure_is_reported() {
        let result = SerialLink::open(Opens(VecDeque::from([Err(())])));
        assert!(matches!(result, Err(LinkError::Open { .. })));
    }

    #[test]
    fn test_timeout_is_not_an_error() {
        let mut link = SerialLink::open(Opens(VecDeque::from([Ok(vec![Step::Timeout, Step::Line("a")])]))).unwrap();
        assert_eq!(link.read_line().unwrap(), None);
        assert_eq!(link.read_line().unwrap(), Some("a".into()));
        assert_eq!(link.state(), LinkState::Connected);
    }

    #[test]
    fn test_fault_then_successful_reconnect() {
        let mut link = SerialLink::open(Opens(VecDeque::from([
            Ok(vec![Step::Fault]),
            Ok(vec![Step::Line("after")]),
        ])))
        .unwrap();
        assert_eq!(link.read_line().unwrap(), None);
        assert_eq!(link.state(), LinkState::Connected);
        assert_eq!(link.read_line().unwrap(), Some("after".into()));
    }

    #[test]
    fn test_fault_then_failed_reconnect_is_terminal() {
        let mut link = SerialLink::open(Opens(VecDeque::from([Ok(vec![Step::Fault]), Err(())]))).unwrap();
        assert!(matches!(link.read_line(), Err(LinkError::Failed { .. })));
        assert_eq!(link.state(), LinkState::Failed);
        assert!(matches!(link.read_line(), Err(LinkError::Failed { .. })));
        assert!(link.write_line("x").is_err());
    }

    #[test]
    fn test_write_goes_to_transport() {
        let mut link = SerialLink::open(Opens(VecDeque::from([Ok(vec![])]))).unwrap();
        assert!(link.write_line("Lemon,0.00\n").unwrap());
        assert_eq!(link.transport.as_ref().unwrap().written, vec!["Lemon,0.00\n".to_string()]);
    }

    #[test]
    fn test_write_fault_reports_dropped_line() {
        let mut link = SerialLink::open(Opens(VecDeque::from([
            Ok(vec![Step::WriteFault]),
            Ok(vec![]),
        ])))
        .unwrap();
        assert!(!link.write_line("Lemon,0.00\n").unwrap());
        assert_eq!(link.state(), LinkState::Connected);
        assert!(link.transport.as_ref().unwrap().written.is_empty());
        assert!(link.write_line("Lemon,0.00\n").unwrap());
    }

    /// Reader handing out one scripted chunk (or error) per `read` call.
    struct Chunks(VecDeque<io::Result<&'static [u8]>>);

    impl io::Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Ok(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(chunk);
                    Ok(chunk.len())
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    fn timed_out() -> io::Result<&'static [u8]> {
        Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
    }

    #[test]
    fn test_partial_line_survives_timeout() {
        let chunks = Chunks(VecDeque::from([Ok(&b"1.5,2"[..]), timed_out(), Ok(&b",3\r\n4"[..])]));
        let mut lines = LineAssembler::new(BufReader::new(chunks));
        assert_eq!(lines.read_line().unwrap(), None);
        assert_eq!(lines.pending_len(), 5);
        assert_eq!(lines.read_line().unwrap(), Some("1.5,2,3".to_string()));
        assert_eq!(lines.pending_len(), 0);
    }

    #[test]
    fn test_oversized_partial_line_is_discarded() {
        let chunks = Chunks(VecDeque::from([Ok(&b"0123456789"[..]), timed_out(), Ok(&b"ab\n"[..])]));
        let mut lines = LineAssembler::with_max_len(BufReader::new(chunks), 8);
        assert_eq!(lines.read_line().unwrap(), None);
        assert_eq!(lines.pending_len(), 0);
        assert_eq!(lines.read_line().unwrap(), Some("ab".to_string()));
    }

    #[test]
    fn test_end_of_stream_is_a_fault() {
        let mut lines = LineAssembler::new(BufReader::new(Chunks(VecDeque::from([Ok(&b"1,2"[..])]))));
        let err = lines.read_line().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_close_releases_transport() {
        let mut link = SerialLink::open(Opens(VecDeque::from([Ok(vec![Step::Line("a")])]))).unwrap();
        link.close();
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(link.read_line().is_err());
    }
}
