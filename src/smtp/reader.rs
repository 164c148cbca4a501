//! Reads CRLF-terminated lines from the client stream.
//!
//! Used both for command lines and, in the DATA phase, for raw payload
//! lines up to and including the `.\r\n` terminator. Framing is identical
//! in both modes; only the caller's interpretation of the bytes differs.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Outcome of a single `read_line` call.
#[derive(Debug)]
pub enum LineReadOutcome {
    /// A complete line, including its trailing CRLF (or bare LF, see note).
    Line(Vec<u8>),
    /// The stream ended exactly at a line boundary; nothing left to read.
    Eof,
    /// The stream ended mid-line; `partial` holds whatever bytes were read
    /// before EOF. The caller should report this to the handler and close.
    Incomplete { partial: Vec<u8> },
}

/// Buffered line reader over any `AsyncBufRead` source.
///
/// Generic over the reader so the session can be driven by a real
/// `TcpStream` in production and by an in-memory buffer in tests.
pub struct LineReader<R> {
    inner: R,
}

impl<R> LineReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(inner: R) -> Self {
        LineReader { inner }
    }

    /// Reads up to and including the next `\n`.
    ///
    /// Distinguishes a clean EOF (nothing read) from an EOF that cuts a
    /// line short (some bytes read, no trailing `\n`) — the latter is the
    /// transport-incomplete condition the session loop reports and closes on.
    pub async fn read_line(&mut self) -> std::io::Result<LineReadOutcome> {
        let mut buf = Vec::new();
        let n = self.inner.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(LineReadOutcome::Eof);
        }
        if buf.last() == Some(&b'\n') {
            Ok(LineReadOutcome::Line(buf))
        } else {
            Ok(LineReadOutcome::Incomplete { partial: buf })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn reads_a_complete_line() {
        let mut reader = LineReader::new(BufReader::new(&b"HELO foo\r\n"[..]));
        match reader.read_line().await.unwrap() {
            LineReadOutcome::Line(line) => assert_eq!(line, b"HELO foo\r\n"),
            other => panic!("expected Line, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reports_clean_eof() {
        let mut reader = LineReader::new(BufReader::new(&b""[..]));
        match reader.read_line().await.unwrap() {
            LineReadOutcome::Eof => {}
            other => panic!("expected Eof, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reports_incomplete_read() {
        let mut reader = LineReader::new(BufReader::new(&b"HELO foo"[..]));
        match reader.read_line().await.unwrap() {
            LineReadOutcome::Incomplete { partial } => assert_eq!(partial, b"HELO foo"),
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reads_multiple_lines_in_sequence() {
        let mut reader = LineReader::new(BufReader::new(&b"EHLO a\r\nMAIL FROM:<a@b>\r\n"[..]));
        let first = reader.read_line().await.unwrap();
        assert!(matches!(first, LineReadOutcome::Line(ref l) if l == b"EHLO a\r\n"));
        let second = reader.read_line().await.unwrap();
        assert!(matches!(second, LineReadOutcome::Line(ref l) if l == b"MAIL FROM:<a@b>\r\n"));
    }

    #[tokio::test]
    async fn recognizes_data_terminator_line() {
        let mut reader = LineReader::new(BufReader::new(&b".\r\n"[..]));
        match reader.read_line().await.unwrap() {
            LineReadOutcome::Line(line) => assert_eq!(line, b".\r\n"),
            other => panic!("expected Line, got {other:?}"),
        }
    }
}
