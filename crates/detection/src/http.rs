//! Blocking HTTP client for the inference service.
//!
//! Runs on camera consumer threads; the call stalls the thread until the
//! service answers or the configured timeout elapses.

use std::io::Cursor;

use contracts::{DetectorConfig, Detection, Frame};
use image::ImageFormat;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};

use crate::error::{DetectionError, Result};
use crate::response::{parse_response, LabelMap};
use crate::DetectionService;

pub struct HttpDetectionClient {
    client: Client,
    endpoint: String,
    labels: LabelMap,
}

impl HttpDetectionClient {
    /// Build a client. Must not be called from inside an async runtime.
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DetectionError::transport(format!("client build failed: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            labels: LabelMap::new(&config.labels),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// PNG-encode a frame for upload.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>> {
    let image = frame
        .to_image()
        .map_err(|e| DetectionError::encode(e.to_string()))?;
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| DetectionError::encode(e.to_string()))?;
    Ok(buf.into_inner())
}

impl DetectionService for HttpDetectionClient {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(level = "debug", name = "http_detect", skip(self, frame), fields(endpoint = %self.endpoint))]
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let body = encode_png(frame)?;
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "image/png")
            .body(body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    DetectionError::timeout(e.to_string())
                } else {
                    DetectionError::transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(DetectionError::status(status.as_u16(), text));
        }
        let bytes = response
            .bytes()
            .map_err(|e| DetectionError::transport(e.to_string()))?;
        let detections = parse_response(&bytes, &self.labels)?;
        debug!(count = detections.len(), "Detector answered");
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::ObjectClass;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve exactly one HTTP response on a random local port.
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(v) = lower.strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();
            assert!(request_body.starts_with(b"\x89PNG"));

            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
        });
        format!("http://{addr}/predictions")
    }

    fn config(endpoint: String) -> DetectorConfig {
        DetectorConfig {
            endpoint,
            timeout_ms: 2000,
            labels: vec!["lane".into(), "car".into()],
        }
    }

    #[test]
    fn test_detect_posts_png_and_parses_answer() {
        let endpoint = serve_once("200 OK", r#"[{"bbox": [[0, 0, 8, 8]], "label": [1]}]"#);
        let mut client = HttpDetectionClient::new(&config(endpoint)).unwrap();
        let dets = client.detect(&Frame::black(16, 16, Utc::now())).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class, ObjectClass::Car);
    }

    #[test]
    fn test_non_success_status_is_reported() {
        let endpoint = serve_once("503 Service Unavailable", "busy");
        let mut client = HttpDetectionClient::new(&config(endpoint)).unwrap();
        let err = client.detect(&Frame::black(16, 16, Utc::now())).unwrap_err();
        assert!(matches!(err, DetectionError::Status { status: 503, .. }));
    }

    #[test]
    fn test_unreachable_service_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let mut client =
            HttpDetectionClient::new(&config(format!("http://{addr}/predictions"))).unwrap();
        let err = client.detect(&Frame::black(16, 16, Utc::now())).unwrap_err();
        assert!(err.is_transient());
    }
}
