//! Minimal WARC read/write primitives.
//!
//! The engine persists HTTP traffic as WARC 1.1 `response` records: WARC
//! headers, a blank line, then an HTTP response payload framed by
//! `Content-Length`. One custom WARC header, `X-HTTP-Method`, records the
//! request method so replay can key on it. Files ending in `.gz` are
//! gzip-compressed.
//!
//! Only what capture and replay need is implemented here; these are the
//! `read_records` / `write_record` primitives, not a general WARC library.

use crate::error::Error;
use chrono::{SecondsFormat, Utc};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Custom WARC header carrying the HTTP request method.
pub const HEADER_HTTP_METHOD: &str = "X-HTTP-Method";

/// One stored `response` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRecord {
    pub target_uri: String,
    /// Request method from `X-HTTP-Method`; absent in records written by
    /// other tools.
    pub http_method: Option<String>,
    pub status_code: u16,
    pub body: Vec<u8>,
}

enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

/// Streaming WARC writer. Must be finished (or dropped) to flush.
pub struct WarcWriter {
    sink: Option<Sink>,
    path: PathBuf,
}

impl WarcWriter {
    /// Open a WARC file for writing, creating parent directories. The file
    /// is gzip-compressed when the path ends in `.gz`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = BufWriter::new(File::create(path)?);
        let sink = if path.to_string_lossy().ends_with(".gz") {
            Sink::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            Sink::Plain(file)
        };
        Ok(Self {
            sink: Some(sink),
            path: path.to_path_buf(),
        })
    }

    /// Append one `response` record.
    ///
    /// # Errors
    ///
    /// Returns an error when the writer is already finished or the write
    /// fails.
    pub fn write_record(&mut self, record: &ResponseRecord) -> Result<(), Error> {
        let Some(sink) = self.sink.as_mut() else {
            return Err(Error::warc(format!(
                "WARC writer for {} is already closed",
                self.path.display()
            )));
        };

        let payload = {
            let mut bytes = format!("HTTP/1.1 {} OK\r\n\r\n", record.status_code).into_bytes();
            bytes.extend_from_slice(&record.body);
            bytes
        };
        let date = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let record_id = {
            let mut hasher = Sha256::new();
            hasher.update(record.target_uri.as_bytes());
            hasher.update(date.as_bytes());
            hasher.update(&record.body);
            format!("<urn:sha256:{:x}>", hasher.finalize())
        };

        write!(sink, "WARC/1.1\r\n")?;
        write!(sink, "WARC-Type: response\r\n")?;
        write!(sink, "WARC-Record-ID: {record_id}\r\n")?;
        write!(sink, "WARC-Date: {date}\r\n")?;
        write!(sink, "WARC-Target-URI: {}\r\n", record.target_uri)?;
        if let Some(method) = &record.http_method {
            write!(sink, "{HEADER_HTTP_METHOD}: {method}\r\n")?;
        }
        write!(sink, "Content-Type: application/http;msgtype=response\r\n")?;
        write!(sink, "Content-Length: {}\r\n", payload.len())?;
        write!(sink, "\r\n")?;
        sink.write_all(&payload)?;
        write!(sink, "\r\n\r\n")?;
        Ok(())
    }

    /// Flush and close the underlying stream. Safe to call twice.
    ///
    /// # Errors
    ///
    /// Returns an error when the final flush fails.
    pub fn finish(&mut self) -> Result<(), Error> {
        match self.sink.take() {
            None => Ok(()),
            Some(Sink::Plain(mut w)) => {
                w.flush()?;
                Ok(())
            }
            Some(Sink::Gzip(encoder)) => {
                let mut inner = encoder.finish()?;
                inner.flush()?;
                Ok(())
            }
        }
    }
}

impl Drop for WarcWriter {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

/// Read every `response` record from a WARC file (gzip-aware).
///
/// # Errors
///
/// Returns an error when the file cannot be read or a record is malformed.
pub fn read_records(path: &Path) -> Result<Vec<ResponseRecord>, Error> {
    let mut file = File::open(path)?;
    let mut raw = Vec::new();
    if path.to_string_lossy().ends_with(".gz") {
        MultiGzDecoder::new(file).read_to_end(&mut raw)?;
    } else {
        file.read_to_end(&mut raw)?;
    }
    parse_records(&raw)
}

fn parse_records(raw: &[u8]) -> Result<Vec<ResponseRecord>, Error> {
    let mut records = Vec::new();
    let mut cursor = 0;

    while cursor < raw.len() {
        // Skip inter-record blank lines
        while raw[cursor..].starts_with(b"\r\n") {
            cursor += 2;
        }
        if cursor >= raw.len() {
            break;
        }

        let header_end = find(&raw[cursor..], b"\r\n\r\n")
            .ok_or_else(|| Error::warc("truncated record header"))?;
        let header_block = std::str::from_utf8(&raw[cursor..cursor + header_end])
            .map_err(|_| Error::warc("record header is not valid UTF-8"))?;
        cursor += header_end + 4;

        let mut lines = header_block.split("\r\n");
        let version = lines.next().unwrap_or_default();
        if !version.starts_with("WARC/") {
            return Err(Error::warc(format!("unexpected record version: {version}")));
        }

        let mut record_type = None;
        let mut target_uri = None;
        let mut http_method = None;
        let mut content_length = None;
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match name.trim() {
                "WARC-Type" => record_type = Some(value.to_string()),
                "WARC-Target-URI" => target_uri = Some(value.to_string()),
                HEADER_HTTP_METHOD => http_method = Some(value.to_string()),
                "Content-Length" => {
                    content_length = Some(value.parse::<usize>().map_err(|_| {
                        Error::warc(format!("invalid Content-Length: {value}"))
                    })?);
                }
                _ => {}
            }
        }

        let length =
            content_length.ok_or_else(|| Error::warc("record without Content-Length"))?;
        if cursor + length > raw.len() {
            return Err(Error::warc("record payload extends past end of file"));
        }
        let payload = &raw[cursor..cursor + length];
        cursor += length;

        if record_type.as_deref() == Some("response") {
            if let Some(target_uri) = target_uri {
                let (status_code, body) = split_http_payload(payload);
                records.push(ResponseRecord {
                    target_uri,
                    http_method,
                    status_code,
                    body,
                });
            }
        }
    }

    Ok(records)
}

/// Split an `application/http` response payload into status and body.
/// Payloads without an HTTP envelope are treated as a bare 200 body.
fn split_http_payload(payload: &[u8]) -> (u16, Vec<u8>) {
    if payload.starts_with(b"HTTP/") {
        if let Some(end) = find(payload, b"\r\n\r\n") {
            let status = std::str::from_utf8(&payload[..end])
                .ok()
                .and_then(|head| head.split_whitespace().nth(1))
                .and_then(|code| code.parse().ok())
                .unwrap_or(200);
            return (status, payload[end + 4..].to_vec());
        }
    }
    (200, payload.to_vec())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(uri: &str, body: &[u8]) -> ResponseRecord {
        ResponseRecord {
            target_uri: uri.to_string(),
            http_method: Some("GET".to_string()),
            status_code: 200,
            body: body.to_vec(),
        }
    }

    #[test]
    fn write_then_read_plain() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("capture.warc");

        let mut writer = WarcWriter::create(&path).unwrap();
        writer
            .write_record(&record("https://court.example/cases", b"<html>list</html>"))
            .unwrap();
        writer
            .write_record(&record("https://court.example/cases/1", b"<html>one</html>"))
            .unwrap();
        writer.finish().unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].target_uri, "https://court.example/cases");
        assert_eq!(records[0].body, b"<html>list</html>");
        assert_eq!(records[0].http_method.as_deref(), Some("GET"));
        assert_eq!(records[1].status_code, 200);
    }

    #[test]
    fn write_then_read_gzip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("capture.warc.gz");

        let mut writer = WarcWriter::create(&path).unwrap();
        writer
            .write_record(&record("https://court.example/cases", b"compressed body"))
            .unwrap();
        writer.finish().unwrap();

        // The raw file must actually be gzip (magic bytes)
        let raw = std::fs::read(&path).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].body, b"compressed body");
    }

    #[test]
    fn status_code_survives_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.warc");
        let mut writer = WarcWriter::create(&path).unwrap();
        writer
            .write_record(&ResponseRecord {
                target_uri: "https://court.example/missing".to_string(),
                http_method: Some("GET".to_string()),
                status_code: 404,
                body: b"not found".to_vec(),
            })
            .unwrap();
        writer.finish().unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records[0].status_code, 404);
        assert_eq!(records[0].body, b"not found");
    }

    #[test]
    fn payload_without_http_envelope_defaults_to_200() {
        let (status, body) = split_http_payload(b"just bytes");
        assert_eq!(status, 200);
        assert_eq!(body, b"just bytes");
    }

    #[test]
    fn writer_rejects_use_after_finish() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("closed.warc");
        let mut writer = WarcWriter::create(&path).unwrap();
        writer.finish().unwrap();
        let err = writer
            .write_record(&record("https://court.example/", b""))
            .unwrap_err();
        assert!(err.to_string().contains("already closed"));
    }
}
