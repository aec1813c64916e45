use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{build_prompt, parse_remote_json, Provider, RemoteSummary, SUMMARIZE_TIMEOUT};
use crate::ingest::types::NormalizedItem;

const RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

/// OpenAI Responses API with JSON-object output.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SUMMARIZE_TIMEOUT)
            .build()
            .context("building openai http client")?;
        Ok(Self {
            http,
            api_key,
            model,
        })
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Format {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct TextOpts {
    format: Format,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    input: Vec<Msg<'a>>,
    text: TextOpts,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

/// First text part across output items (reasoning items carry no content).
fn first_output_text(resp: Resp) -> Option<String> {
    resp.output
        .into_iter()
        .flat_map(|o| o.content)
        .find_map(|c| c.text)
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn fetch(&self, item: &NormalizedItem) -> Result<RemoteSummary> {
        let prompt = build_prompt(item);
        let req = Req {
            model: &self.model,
            input: vec![Msg {
                role: "user",
                content: &prompt,
            }],
            text: TextOpts {
                format: Format {
                    kind: "json_object",
                },
            },
        };

        let resp: Resp = self
            .http
            .post(RESPONSES_URL)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai request")?
            .error_for_status()
            .context("openai non-2xx")?
            .json()
            .await
            .context("openai response body")?;

        let text = first_output_text(resp).ok_or_else(|| anyhow!("openai response has no text"))?;
        parse_remote_json(&text)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
