use async_trait::async_trait;
use loadpilot_core::api::{GeminiConfig, ModelClient, ModelError};
use serde::{Deserialize, Serialize};

const BODY_PREVIEW_LIMIT: usize = 512;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Default)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Text parts of the first candidate, concatenated.
    fn into_text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let text: String = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    let mut out: String = trimmed.chars().take(BODY_PREVIEW_LIMIT).collect();
    if trimmed.chars().count() > BODY_PREVIEW_LIMIT {
        out.push_str("...");
    }
    out
}

fn from_reqwest(err: reqwest::Error, url: &str) -> ModelError {
    if err.is_timeout() {
        ModelError::Timeout(format!("{url}: {err}"))
    } else if err.is_decode() {
        ModelError::Decode(format!("{url}: {err}"))
    } else {
        ModelError::Request(format!("{url}: {err}"))
    }
}

/// Gemini `generateContent` over HTTPS.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    http: reqwest::Client,
    url_generate: String,
}

impl GeminiClient {
    pub fn new(cfg: &GeminiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
            .build()?;
        let normalized = cfg.base_url.trim_end_matches('/');
        Ok(Self {
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            http,
            url_generate: format!("{normalized}/v1beta/models/{}:generateContent", cfg.model),
        })
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.trim().is_empty() {
            req
        } else {
            req.header("x-goog-api-key", &self.api_key)
        }
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let url = &self.url_generate;
        tracing::debug!(
            target: "loadpilot.model",
            stage = "gemini.generate.in",
            url = %url,
            prompt_chars = prompt.chars().count()
        );

        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };
        let resp = self
            .auth(self.http.post(url).json(&body))
            .send()
            .await
            .map_err(|err| from_reqwest(err, url))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|err| from_reqwest(err, url))?;
        if !status.is_success() {
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: preview_body(&text),
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&text).map_err(|err| {
            ModelError::Decode(format!("{err} | body={}", preview_body(&text)))
        })?;

        tracing::debug!(target: "loadpilot.model", stage = "gemini.generate.out", status = %status);
        parsed.into_text().ok_or(ModelError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

    fn client(base_url: String) -> GeminiClient {
        GeminiClient::new(&GeminiConfig {
            base_url,
            api_key: "secret".into(),
            model: "gemini-2.0-flash".into(),
            timeout_ms: 2_000,
        })
        .unwrap()
    }

    #[test]
    fn preview_body_truncates() {
        assert_eq!(preview_body("  "), "<empty body>");
        let preview = preview_body(&"a".repeat(BODY_PREVIEW_LIMIT + 10));
        assert!(preview.ends_with("..."));
        assert_eq!(preview.len(), BODY_PREVIEW_LIMIT + 3);
    }

    #[tokio::test]
    async fn joins_text_parts_of_first_candidate() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", PATH)
            .match_header("x-goog-api-key", "secret")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "contents": [{"parts": [{"text": "describe"}]}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[
                    {"content":{"parts":[{"text":"```xml\n"},{"text":"<a/>\n```"}]}},
                    {"content":{"parts":[{"text":"ignored"}]}}
                ]}"#,
            )
            .create_async()
            .await;

        let text = client(server.url()).complete("describe").await.unwrap();
        assert_eq!(text, "```xml\n<a/>\n```");
    }

    #[tokio::test]
    async fn status_errors_carry_a_preview() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", PATH)
            .with_status(429)
            .with_body(r#"{"error":{"message":"quota exceeded"}}"#)
            .create_async()
            .await;

        match client(server.url()).complete("p").await.unwrap_err() {
            ModelError::Status { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("quota exceeded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_and_garbled_responses() {
        let mut server = Server::new_async().await;
        let _empty = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(r#"{"candidates":[]}"#)
            .expect(1)
            .create_async()
            .await;
        assert!(matches!(
            client(server.url()).complete("p").await,
            Err(ModelError::Empty)
        ));

        let mut server = Server::new_async().await;
        let _garbled = server
            .mock("POST", PATH)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;
        assert!(matches!(
            client(server.url()).complete("p").await,
            Err(ModelError::Decode(_))
        ));
    }
}
