//! Byte-level framing for the two transports. Every length a peer declares
//! is checked against [`MAX_BODY_BYTES`] before anything is allocated for it.

use std::io::{self, BufRead, Read, Write};

/// Largest JSON-RPC payload accepted on either transport. Site inputs are a
/// handful of numbers, so this is generous.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;
const MAX_BODY_LEN: u64 = MAX_BODY_BYTES as u64;

/// Longest header or request line accepted before the peer is cut off.
const MAX_LINE_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// One JSON document per line.
    Line,
    /// LSP-style `Content-Length` header block followed by the body.
    ContentLength,
}

#[derive(Debug, PartialEq, Eq)]
pub enum StdioMessage {
    Payload(Vec<u8>, Framing),
    /// Unusable frame; the reason goes back to the client as a parse error.
    Rejected(String, Framing),
    Eof,
}

/// Reads the next message, skipping blank lines. Oversized bodies are
/// drained without being buffered so the stream stays in sync.
pub fn read_stdio_message<R: BufRead>(reader: &mut R) -> io::Result<StdioMessage> {
    loop {
        let Some(line) = read_bounded_line(reader, MAX_BODY_BYTES)? else {
            return Ok(StdioMessage::Eof);
        };
        let line = match line {
            BoundedLine::Complete(bytes) => bytes,
            BoundedLine::Overlong => {
                return Ok(StdioMessage::Rejected(
                    format!("message exceeds {MAX_BODY_BYTES} bytes"),
                    Framing::Line,
                ))
            }
        };
        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if !starts_header_block(text) {
            return Ok(StdioMessage::Payload(text.as_bytes().to_vec(), Framing::Line));
        }

        let declared = match read_header_block(reader, Some(text))? {
            Ok(declared) => declared,
            Err(reason) => return Ok(StdioMessage::Rejected(reason, Framing::ContentLength)),
        };
        let Some(len) = declared else {
            return Ok(StdioMessage::Rejected(
                "missing Content-Length header".to_string(),
                Framing::ContentLength,
            ));
        };
        if len > MAX_BODY_LEN {
            io::copy(&mut reader.by_ref().take(len), &mut io::sink())?;
            return Ok(StdioMessage::Rejected(
                format!("frame of {len} bytes exceeds {MAX_BODY_BYTES}"),
                Framing::ContentLength,
            ));
        }
        let mut body = Vec::new();
        reader.by_ref().take(len).read_to_end(&mut body)?;
        if body.len() < usize::try_from(len).unwrap_or(usize::MAX) {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdio frame body truncated",
            ));
        }
        return Ok(StdioMessage::Payload(body, Framing::ContentLength));
    }
}

pub fn write_stdio_message<W: Write>(out: &mut W, payload: &[u8], framing: Framing) -> io::Result<()> {
    if framing == Framing::ContentLength {
        write!(out, "Content-Length: {}\r\n\r\n", payload.len())?;
        out.write_all(payload)?;
    } else {
        out.write_all(payload)?;
        out.write_all(b"\n")?;
    }
    out.flush()
}

#[derive(Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum HttpIncoming {
    Request(HttpRequest),
    /// Declared body larger than [`MAX_BODY_BYTES`]; nothing was read past
    /// the headers.
    TooLarge(u64),
    Malformed(String),
    Closed,
}

pub fn read_http_request<R: BufRead>(reader: &mut R) -> io::Result<HttpIncoming> {
    let request_line = match read_bounded_line(reader, MAX_LINE_BYTES)? {
        None => return Ok(HttpIncoming::Closed),
        Some(BoundedLine::Overlong) => {
            return Ok(HttpIncoming::Malformed("request line too long".to_string()))
        }
        Some(BoundedLine::Complete(bytes)) => String::from_utf8_lossy(&bytes).trim().to_string(),
    };
    if request_line.is_empty() {
        return Ok(HttpIncoming::Closed);
    }

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Ok(HttpIncoming::Malformed(format!(
            "bad request line: {request_line}"
        )));
    };
    let path = target.split('?').next().unwrap_or(target).to_string();
    let method = method.to_string();

    let declared = match read_header_block(reader, None)? {
        Ok(declared) => declared.unwrap_or(0),
        Err(reason) => return Ok(HttpIncoming::Malformed(reason)),
    };
    if declared > MAX_BODY_LEN {
        return Ok(HttpIncoming::TooLarge(declared));
    }

    let mut body = Vec::new();
    reader.by_ref().take(declared).read_to_end(&mut body)?;
    Ok(HttpIncoming::Request(HttpRequest { method, path, body }))
}

pub fn write_http_response<W: Write>(
    out: &mut W,
    status: u16,
    body: &[u8],
) -> io::Result<()> {
    write!(
        out,
        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reason_phrase(status),
        body.len()
    )?;
    out.write_all(body)?;
    out.flush()
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        _ => "Internal Server Error",
    }
}

enum BoundedLine {
    Complete(Vec<u8>),
    Overlong,
}

/// Reads through the next `\n`, keeping at most `limit` bytes. An overlong
/// line is consumed to its end and reported without its content.
fn read_bounded_line<R: BufRead>(reader: &mut R, limit: usize) -> io::Result<Option<BoundedLine>> {
    let mut line = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let read = reader.by_ref().take(cap).read_until(b'\n', &mut line)?;
    if read == 0 {
        return Ok(None);
    }
    if line.len() <= limit || line.ends_with(b"\n") {
        return Ok(Some(BoundedLine::Complete(line)));
    }
    let mut rest = Vec::new();
    loop {
        rest.clear();
        let n = reader.by_ref().take(cap).read_until(b'\n', &mut rest)?;
        if n == 0 || rest.ends_with(b"\n") {
            return Ok(Some(BoundedLine::Overlong));
        }
    }
}

fn starts_header_block(line: &str) -> bool {
    header_value(line, "content-length").is_some() || header_value(line, "content-type").is_some()
}

fn header_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let (key, value) = line.split_once(':')?;
    key.trim().eq_ignore_ascii_case(name).then_some(value.trim())
}

/// Consumes headers up to the blank line and returns the declared body
/// length. The outer `Err` is an I/O failure; the inner one a bad header.
fn read_header_block<R: BufRead>(
    reader: &mut R,
    first: Option<&str>,
) -> io::Result<Result<Option<u64>, String>> {
    let mut declared = None;
    let mut pending = first.map(str::to_string);
    loop {
        let header = match pending.take() {
            Some(line) => line,
            None => match read_bounded_line(reader, MAX_LINE_BYTES)? {
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "eof inside header block",
                    ))
                }
                Some(BoundedLine::Overlong) => return Ok(Err("header line too long".to_string())),
                Some(BoundedLine::Complete(bytes)) => {
                    String::from_utf8_lossy(&bytes).trim().to_string()
                }
            },
        };
        if header.is_empty() {
            return Ok(Ok(declared));
        }
        if let Some(value) = header_value(&header, "content-length") {
            match value.parse::<u64>() {
                Ok(len) => declared = Some(len),
                Err(_) => return Ok(Err(format!("invalid Content-Length: {value}"))),
            }
        }
    }
}
