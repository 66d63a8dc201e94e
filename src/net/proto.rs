//! Wire protocol: line-oriented, whitespace-delimited, CRLF-terminated text
//! over TCP.
//!
//! Worker to coordinator: `MOIN <thread_count>` once at connect, then
//! `DONE <slot_id>` per finished frame. Coordinator to worker:
//! `RENDER <slot_id> <frame_no> <body_len> <width> <height>` followed by
//! exactly `body_len` bytes of a serialized spec, and `TERMINATE` before
//! close. Anything else is a protocol violation, fatal for the connection.

use std::io::{BufRead, Read, Write};

use crate::error::ProtocolError;
use crate::spec::FractalSpec;

/// Longest acceptable line, including CRLF.
pub const MAX_LINE: usize = 256;
/// Largest acceptable RENDER body.
pub const MAX_BODY: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMsg {
    Moin { threads: u32 },
    Done { slot: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoordMsg {
    Render {
        slot: u32,
        frame: u32,
        width: u32,
        height: u32,
        spec: FractalSpec,
    },
    Terminate,
}

/// Read one CRLF-terminated line. Overlong input is a violation, EOF means
/// the peer closed the connection.
pub fn read_line<R: BufRead>(reader: &mut R) -> Result<String, ProtocolError> {
    let mut buf = Vec::new();
    let mut limited = reader.take(MAX_LINE as u64 + 1);
    limited.read_until(b'\n', &mut buf)?;
    if buf.is_empty() {
        return Err(ProtocolError::ConnectionClosed);
    }
    if buf.last() != Some(&b'\n') {
        if buf.len() > MAX_LINE {
            return Err(ProtocolError::OverlongLine(MAX_LINE));
        }
        return Err(ProtocolError::ConnectionClosed);
    }
    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|_| ProtocolError::UnknownKeyword("<non-utf8>".into()))
}

pub fn parse_worker_msg(line: &str) -> Result<WorkerMsg, ProtocolError> {
    let mut words = line.split_ascii_whitespace();
    match words.next() {
        Some("MOIN") => {
            let threads = parse_field(words.next(), "MOIN", "thread_count")?;
            finish(words, line)?;
            Ok(WorkerMsg::Moin { threads })
        }
        Some("DONE") => {
            let slot = parse_field(words.next(), "DONE", "slot_id")?;
            finish(words, line)?;
            Ok(WorkerMsg::Done { slot })
        }
        Some(other) => Err(ProtocolError::UnknownKeyword(other.to_string())),
        None => Err(ProtocolError::UnknownKeyword(String::new())),
    }
}

/// Read a full coordinator command, including the RENDER body.
pub fn read_coord_msg<R: BufRead>(reader: &mut R) -> Result<CoordMsg, ProtocolError> {
    let line = read_line(reader)?;
    let mut words = line.split_ascii_whitespace();
    match words.next() {
        Some("RENDER") => {
            let slot = parse_field(words.next(), "RENDER", "slot_id")?;
            let frame = parse_field(words.next(), "RENDER", "frame_no")?;
            let body_len: u32 = parse_field(words.next(), "RENDER", "body_len")?;
            let width = parse_field(words.next(), "RENDER", "width")?;
            let height = parse_field(words.next(), "RENDER", "height")?;
            finish(words, &line)?;
            if body_len as usize > MAX_BODY {
                return Err(ProtocolError::MalformedField {
                    keyword: "RENDER",
                    field: "body_len",
                });
            }
            let mut body = vec![0u8; body_len as usize];
            reader.read_exact(&mut body)?;
            let spec: FractalSpec = serde_json::from_slice(&body)?;
            Ok(CoordMsg::Render {
                slot,
                frame,
                width,
                height,
                spec,
            })
        }
        Some("TERMINATE") => {
            finish(words, &line)?;
            Ok(CoordMsg::Terminate)
        }
        Some(other) => Err(ProtocolError::UnknownKeyword(other.to_string())),
        None => Err(ProtocolError::UnknownKeyword(String::new())),
    }
}

pub fn send_moin<W: Write>(writer: &mut W, threads: u32) -> Result<(), ProtocolError> {
    write!(writer, "MOIN {}\r\n", threads)?;
    writer.flush()?;
    Ok(())
}

pub fn send_done<W: Write>(writer: &mut W, slot: u32) -> Result<(), ProtocolError> {
    write!(writer, "DONE {}\r\n", slot)?;
    writer.flush()?;
    Ok(())
}

pub fn send_render<W: Write>(
    writer: &mut W,
    slot: u32,
    frame: u32,
    width: u32,
    height: u32,
    spec: &FractalSpec,
) -> Result<(), ProtocolError> {
    let body = serde_json::to_vec(spec)?;
    write!(
        writer,
        "RENDER {} {} {} {} {}\r\n",
        slot,
        frame,
        body.len(),
        width,
        height
    )?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

pub fn send_terminate<W: Write>(writer: &mut W) -> Result<(), ProtocolError> {
    write!(writer, "TERMINATE\r\n")?;
    writer.flush()?;
    Ok(())
}

fn parse_field<T: std::str::FromStr>(
    word: Option<&str>,
    keyword: &'static str,
    field: &'static str,
) -> Result<T, ProtocolError> {
    word.and_then(|w| w.parse().ok())
        .ok_or(ProtocolError::MalformedField { keyword, field })
}

fn finish<'a, I: Iterator<Item = &'a str>>(
    mut words: I,
    line: &str,
) -> Result<(), ProtocolError> {
    if words.next().is_some() {
        return Err(ProtocolError::UnexpectedMessage(line.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    #[test]
    fn worker_lines_parse() {
        assert_eq!(
            parse_worker_msg("MOIN 4").unwrap(),
            WorkerMsg::Moin { threads: 4 }
        );
        assert_eq!(parse_worker_msg("DONE 2").unwrap(), WorkerMsg::Done { slot: 2 });
    }

    #[test]
    fn malformed_lines_are_violations() {
        assert!(parse_worker_msg("MOIN").is_err());
        assert!(parse_worker_msg("MOIN four").is_err());
        assert!(parse_worker_msg("MOIN 4 extra").is_err());
        assert!(parse_worker_msg("HELLO 1").is_err());
        assert!(parse_worker_msg("").is_err());
    }

    #[test]
    fn overlong_line_is_fatal() {
        let long = vec![b'A'; MAX_LINE + 10];
        let mut reader = BufReader::new(&long[..]);
        match read_line(&mut reader) {
            Err(ProtocolError::OverlongLine(_)) => {}
            other => panic!("expected overlong error, got {:?}", other),
        }
    }

    #[test]
    fn crlf_is_stripped() {
        let mut reader = BufReader::new(&b"DONE 0\r\nrest"[..]);
        assert_eq!(read_line(&mut reader).unwrap(), "DONE 0");
    }

    #[test]
    fn eof_reports_closed() {
        let mut reader = BufReader::new(&b""[..]);
        assert!(matches!(
            read_line(&mut reader),
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[test]
    fn render_roundtrip() {
        let spec = FractalSpec::julia(-0.123, 0.745, 300);
        let mut wire = Vec::new();
        send_render(&mut wire, 1, 42, 640, 480, &spec).unwrap();
        let mut reader = BufReader::new(&wire[..]);
        match read_coord_msg(&mut reader).unwrap() {
            CoordMsg::Render {
                slot,
                frame,
                width,
                height,
                spec: parsed,
            } => {
                assert_eq!((slot, frame, width, height), (1, 42, 640, 480));
                assert_eq!(parsed, spec);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn terminate_roundtrip() {
        let mut wire = Vec::new();
        send_terminate(&mut wire).unwrap();
        let mut reader = BufReader::new(&wire[..]);
        assert_eq!(read_coord_msg(&mut reader).unwrap(), CoordMsg::Terminate);
    }

    #[test]
    fn garbage_body_is_violation() {
        let mut wire = Vec::new();
        write!(wire, "RENDER 0 0 7 64 64\r\nnotjson").unwrap();
        let mut reader = BufReader::new(&wire[..]);
        assert!(read_coord_msg(&mut reader).is_err());
    }
}
