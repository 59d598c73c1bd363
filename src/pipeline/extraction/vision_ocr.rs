//! Vision OCR engine: extracts text from report images via an Ollama-compatible
//! vision model over `/api/chat`.
//!
//! The model is opaque; only request shape and error mapping live here.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::types::{OcrEngine, OcrPageResult};
use super::ExtractionError;

const SYSTEM_PROMPT: &str = "\
You are a laboratory report text extractor. Extract ALL visible text from the \
provided image exactly as printed, one table row per line. Do not summarize or \
interpret values.";

const USER_PROMPT: &str = "\
Extract all visible text from this lab report image. Keep each test name, value, \
unit and reference range on the same line.";

/// Production OCR engine backed by a local Ollama instance.
pub struct OllamaVisionOcr {
    base_url: String,
    model_name: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ChatOptions {
    /// 0.0 for deterministic extraction.
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OllamaVisionOcr {
    pub fn new(base_url: &str, model_name: &str, timeout_secs: u64) -> Result<Self, ExtractionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExtractionError::OcrUnavailable(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model_name: model_name.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl OcrEngine for OllamaVisionOcr {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let _span = tracing::info_span!(
            "vision_ocr_extract",
            model = %self.model_name,
            image_size = image_bytes.len(),
        )
        .entered();
        let start = std::time::Instant::now();

        let base64_image = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let body = ChatRequest {
            model: &self.model_name,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                    images: None,
                },
                ChatMessage {
                    role: "user",
                    content: USER_PROMPT,
                    images: Some(vec![base64_image]),
                },
            ],
            stream: false,
            options: ChatOptions { temperature: 0.0 },
        };

        let url = format!("{}/api/chat", self.base_url);
        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                ExtractionError::OcrUnavailable(self.base_url.clone())
            } else if e.is_timeout() {
                ExtractionError::OcrProcessing(format!(
                    "Request timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                ExtractionError::OcrProcessing(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::OcrProcessing(format!(
                "HTTP {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ExtractionError::OcrProcessing(e.to_string()))?;
        let text = parsed.message.content.trim().to_string();
        let confidence = if text.is_empty() { 0.0 } else { 0.8 };

        tracing::info!(
            model = %self.model_name,
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = text.len(),
            "Vision OCR extraction complete"
        );

        Ok(OcrPageResult { text, confidence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;

    /// Serve exactly one HTTP response on a local port, returning the request body.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, std::thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = stream;
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8(request_body).unwrap()
        });

        (url, handle)
    }

    #[test]
    fn ocr_returns_message_content() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"message":{"role":"assistant","content":"  Glucose 95 mg/dL 70-100\n"}}"#,
        );
        let ocr = OllamaVisionOcr::new(&url, "llava:7b", 10).unwrap();

        let result = ocr.ocr_image(b"fake-png").unwrap();
        assert_eq!(result.text, "Glucose 95 mg/dL 70-100");
        assert!(result.confidence > 0.0);

        let request: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(request["model"], "llava:7b");
        assert_eq!(request["stream"], false);
        let expected_image = base64::engine::general_purpose::STANDARD.encode(b"fake-png");
        assert_eq!(request["messages"][1]["images"][0], expected_image.as_str());
        assert!(request["messages"][0].get("images").is_none());
    }

    #[test]
    fn ocr_maps_http_error_status() {
        let (url, server) = serve_once(
            "HTTP/1.1 404 Not Found",
            r#"{"error":"model 'missing' not found"}"#,
        );
        let ocr = OllamaVisionOcr::new(&url, "missing", 10).unwrap();

        let err = ocr.ocr_image(b"img").unwrap_err();
        assert!(matches!(err, ExtractionError::OcrProcessing(ref m) if m.contains("404")));
        server.join().unwrap();
    }

    #[test]
    fn ocr_unreachable_endpoint_is_unavailable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let ocr = OllamaVisionOcr::new(&format!("http://127.0.0.1:{port}/"), "llava", 5).unwrap();

        let err = ocr.ocr_image(b"img").unwrap_err();
        assert!(matches!(err, ExtractionError::OcrUnavailable(_)), "got {err}");
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let ocr = OllamaVisionOcr::new("http://localhost:11434/", "llava", 5).unwrap();
        assert_eq!(ocr.base_url, "http://localhost:11434");
        assert_eq!(ocr.model_name(), "llava");
    }
}
