//! REST client for the Gemini generateContent API.
//!
//! Two capabilities live behind traits so the orchestrator can be tested with
//! mocks: grounded document analysis (via inline base64 media) and speech
//! synthesis (audio response modality).

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Hard ceiling on any single upstream call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A base64-encoded document with its MIME type, as extracted from a
/// `data:<mime>;base64,<payload>` URI.
#[derive(Debug, Clone)]
pub struct DocumentBlob {
    pub mime_type: String,
    pub data: String,
}

impl DocumentBlob {
    /// Parses a `data:` URI into its MIME type and base64 payload.
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| anyhow!("Invalid document data URI format"))?;
        let (mime_type, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| anyhow!("Document data URI must be base64 encoded"))?;
        if mime_type.is_empty() {
            return Err(anyhow!("Document data URI is missing a MIME type"));
        }
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: payload.to_string(),
        })
    }
}

/// Answers questions grounded strictly in an attached document.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentAnalyst: Send + Sync {
    async fn analyze(
        &self,
        document: &DocumentBlob,
        system_instruction: &str,
        query: &str,
    ) -> Result<String>;
}

/// Converts text into raw PCM speech audio.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Client for the Gemini REST API, covering both document analysis and
/// text-to-speech generation.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    document_model: String,
    tts_model: String,
    tts_voice: String,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        document_model: String,
        tts_model: String,
        tts_voice: String,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: GEMINI_API_BASE.to_string(),
            api_key,
            document_model,
            tts_model,
            tts_voice,
        })
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &wire::GenerateContentRequest,
    ) -> Result<wire::GenerateContentResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .context("Gemini request failed")?
            .error_for_status()
            .context("Gemini returned an error status")?;
        response
            .json::<wire::GenerateContentResponse>()
            .await
            .context("Failed to parse Gemini response")
    }
}

#[async_trait]
impl DocumentAnalyst for GeminiClient {
    async fn analyze(
        &self,
        document: &DocumentBlob,
        system_instruction: &str,
        query: &str,
    ) -> Result<String> {
        let request = wire::GenerateContentRequest {
            contents: vec![wire::Content {
                role: Some("user".to_string()),
                parts: vec![
                    wire::Part {
                        text: None,
                        inline_data: Some(wire::Blob {
                            mime_type: document.mime_type.clone(),
                            data: document.data.clone(),
                        }),
                    },
                    wire::Part {
                        text: Some(query.to_string()),
                        inline_data: None,
                    },
                ],
            }],
            system_instruction: Some(wire::Content {
                role: None,
                parts: vec![wire::Part {
                    text: Some(system_instruction.to_string()),
                    inline_data: None,
                }],
            }),
            generation_config: None,
        };

        let response = self.generate_content(&self.document_model, &request).await?;
        let text = response.text_parts().join("");
        if text.is_empty() {
            return Err(anyhow!("Gemini returned no text for the document query."));
        }
        Ok(text)
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let request = wire::GenerateContentRequest {
            contents: vec![wire::Content {
                role: Some("user".to_string()),
                parts: vec![wire::Part {
                    text: Some(text.to_string()),
                    inline_data: None,
                }],
            }],
            system_instruction: None,
            generation_config: Some(wire::GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: Some(wire::SpeechConfig {
                    voice_config: wire::VoiceConfig {
                        prebuilt_voice_config: wire::PrebuiltVoiceConfig {
                            voice_name: self.tts_voice.clone(),
                        },
                    },
                }),
            }),
        };

        let response = self.generate_content(&self.tts_model, &request).await?;
        let encoded = response
            .first_inline_data()
            .ok_or_else(|| anyhow!("No audio media was generated."))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .context("Failed to decode audio payload")
    }
}

/// Serde types for the generateContent wire format.
mod wire {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GenerateContentRequest {
        pub contents: Vec<Content>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub system_instruction: Option<Content>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub generation_config: Option<GenerationConfig>,
    }

    #[derive(Debug, Serialize)]
    pub struct Content {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub role: Option<String>,
        pub parts: Vec<Part>,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Part {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub inline_data: Option<Blob>,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Blob {
        pub mime_type: String,
        pub data: String,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GenerationConfig {
        pub response_modalities: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub speech_config: Option<SpeechConfig>,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SpeechConfig {
        pub voice_config: VoiceConfig,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct VoiceConfig {
        pub prebuilt_voice_config: PrebuiltVoiceConfig,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PrebuiltVoiceConfig {
        pub voice_name: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct GenerateContentResponse {
        #[serde(default)]
        pub candidates: Vec<Candidate>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Candidate {
        pub content: Option<CandidateContent>,
    }

    #[derive(Debug, Deserialize)]
    pub struct CandidateContent {
        #[serde(default)]
        pub parts: Vec<ResponsePart>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponsePart {
        pub text: Option<String>,
        pub inline_data: Option<ResponseBlob>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ResponseBlob {
        pub data: String,
    }

    impl GenerateContentResponse {
        pub fn text_parts(&self) -> Vec<&str> {
            self.candidates
                .iter()
                .filter_map(|c| c.content.as_ref())
                .flat_map(|c| c.parts.iter())
                .filter_map(|p| p.text.as_deref())
                .collect()
        }

        pub fn first_inline_data(&self) -> Option<&str> {
            self.candidates
                .iter()
                .filter_map(|c| c.content.as_ref())
                .flat_map(|c| c.parts.iter())
                .find_map(|p| p.inline_data.as_ref().map(|b| b.data.as_str()))
        }
    }
}
