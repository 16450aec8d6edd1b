//! Drives a single assistant turn end to end: knowledge-grounded chat with
//! tool calling, document question answering, and speech synthesis.

use crate::{
    audio::{self, PcmFormat},
    gemini::{DocumentAnalyst, DocumentBlob, SpeechSynthesizer},
    history::{ConversationTurn, Role},
    llm_client::{LLMAction, LLMClient},
    tools::ToolRegistry,
};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionToolArgs,
    FunctionObjectArgs,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Upper bound on tool-calling rounds within one turn. When the model is
/// still asking for tools after this many rounds, the turn ends with the
/// fallback response instead of looping.
pub const MAX_TOOL_ROUNDS: usize = 4;

/// Longest text accepted for speech synthesis, in characters.
pub const MAX_SPEECH_CHARS: usize = 5000;

/// Shown when the model produces no usable text.
pub const FALLBACK_RESPONSE: &str = "I'm sorry, I couldn't generate a response.";

/// Shown when document analysis produces no usable text.
pub const DOCUMENT_FALLBACK_RESPONSE: &str = "I'm sorry, I couldn't process the document.";

/// Failures of a turn, split by who is at fault.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The request was rejected before any external call was made.
    #[error("{0}")]
    InvalidInput(String),
    /// An upstream service call failed.
    #[error(transparent)]
    External(#[from] anyhow::Error),
}

fn external<E: Into<anyhow::Error>>(err: E) -> OrchestratorError {
    OrchestratorError::External(err.into())
}

/// Coordinates the LLM, the tool registry, and the Gemini media backends for
/// every assistant operation. One instance is shared by all sessions.
pub struct Orchestrator {
    llm: Arc<dyn LLMClient>,
    tools: Arc<ToolRegistry>,
    documents: Arc<dyn DocumentAnalyst>,
    speech: Arc<dyn SpeechSynthesizer>,
    chat_prompt: String,
    document_prompt: String,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        tools: Arc<ToolRegistry>,
        documents: Arc<dyn DocumentAnalyst>,
        speech: Arc<dyn SpeechSynthesizer>,
        chat_prompt: String,
        document_prompt: String,
    ) -> Self {
        Self {
            llm,
            tools,
            documents,
            speech,
            chat_prompt,
            document_prompt,
        }
    }

    /// The persona instruction used for knowledge-grounded chat.
    pub fn chat_prompt(&self) -> &str {
        &self.chat_prompt
    }

    /// Answers a question about the portfolio, letting the model call
    /// retrieval tools as needed.
    ///
    /// Tool failures are fed back to the model as JSON error payloads rather
    /// than aborting the turn, so the model can recover or apologize.
    pub async fn answer_from_knowledge(
        &self,
        query: &str,
        history: &[ConversationTurn],
    ) -> Result<String, OrchestratorError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "Query is required and must be a non-empty string".to_string(),
            ));
        }

        let mut messages = self.build_messages(history, query)?;
        let tools = self.chat_tools()?;

        for round in 0..MAX_TOOL_ROUNDS {
            let action = self
                .llm
                .decide_action(messages.clone(), tools.clone())
                .await?;

            match action {
                LLMAction::TextResponse(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        return Ok(FALLBACK_RESPONSE.to_string());
                    }
                    return Ok(text.to_string());
                }
                LLMAction::ToolCall(tool_calls) => {
                    info!(
                        round,
                        count = tool_calls.len(),
                        "Model requested tool calls"
                    );
                    let mut results = Vec::with_capacity(tool_calls.len());
                    for call in &tool_calls {
                        let result = match self
                            .tools
                            .dispatch(&call.function.name, &call.function.arguments)
                        {
                            Ok(value) => value.to_string(),
                            Err(e) => {
                                warn!(tool = %call.function.name, error = %e, "Tool call failed");
                                json!({ "error": e.to_string() }).to_string()
                            }
                        };
                        results.push(result);
                    }

                    messages.push(
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .tool_calls(tool_calls.clone())
                            .build()
                            .map_err(external)?
                            .into(),
                    );
                    for (call, result) in tool_calls.iter().zip(results) {
                        messages.push(
                            ChatCompletionRequestToolMessageArgs::default()
                                .tool_call_id(call.id.clone())
                                .content(result)
                                .build()
                                .map_err(external)?
                                .into(),
                        );
                    }
                }
            }
        }

        warn!("Tool round limit reached without a text response");
        Ok(FALLBACK_RESPONSE.to_string())
    }

    /// Answers a question strictly from an attached document, passed as a
    /// `data:<mime>;base64,<payload>` URI.
    pub async fn answer_from_document(
        &self,
        document_data_uri: &str,
        query: &str,
    ) -> Result<String, OrchestratorError> {
        if document_data_uri.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "Document data URI is required and must be a non-empty string".to_string(),
            ));
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "Query is required and must be a non-empty string".to_string(),
            ));
        }
        if !document_data_uri.starts_with("data:") {
            return Err(OrchestratorError::InvalidInput(
                "Invalid document data URI format".to_string(),
            ));
        }
        let blob = DocumentBlob::from_data_uri(document_data_uri)
            .map_err(|e| OrchestratorError::InvalidInput(e.to_string()))?;

        let answer = self
            .documents
            .analyze(&blob, &self.document_prompt, query)
            .await?;
        if answer.trim().is_empty() {
            return Ok(DOCUMENT_FALLBACK_RESPONSE.to_string());
        }
        Ok(answer)
    }

    /// Synthesizes speech for the given plain text and returns a complete WAV
    /// file. Callers are expected to strip markup beforehand.
    pub async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>, OrchestratorError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "Text is required and must be a non-empty string".to_string(),
            ));
        }
        if text.chars().count() > MAX_SPEECH_CHARS {
            return Err(OrchestratorError::InvalidInput(
                "Text is too long for speech synthesis (max 5000 characters)".to_string(),
            ));
        }

        let pcm = self.speech.synthesize(trimmed).await?;
        audio::encode_wav(&pcm, PcmFormat::default())
            .map_err(|e| external(anyhow::anyhow!("Failed to encode WAV audio: {e}")))
    }

    fn build_messages(
        &self,
        history: &[ConversationTurn],
        query: &str,
    ) -> Result<Vec<ChatCompletionRequestMessage>, OrchestratorError> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.chat_prompt.clone())
                .build()
                .map_err(external)?
                .into(),
        ];
        for turn in history {
            match turn.role {
                Role::User => messages.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(turn.content.clone())
                        .build()
                        .map_err(external)?
                        .into(),
                ),
                Role::Assistant => messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(turn.content.clone())
                        .build()
                        .map_err(external)?
                        .into(),
                ),
                // The system instruction is supplied by the orchestrator, not
                // the caller's history.
                Role::System => {}
            }
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(query.to_string())
                .build()
                .map_err(external)?
                .into(),
        );
        Ok(messages)
    }

    fn chat_tools(&self) -> Result<Vec<ChatCompletionTool>, OrchestratorError> {
        self.tools
            .descriptors()
            .into_iter()
            .map(|d| {
                Ok(ChatCompletionToolArgs::default()
                    .function(
                        FunctionObjectArgs::default()
                            .name(d.name)
                            .description(d.description)
                            .parameters(d.parameters)
                            .build()
                            .map_err(external)?,
                    )
                    .build()
                    .map_err(external)?)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{MockDocumentAnalyst, MockSpeechSynthesizer};
    use crate::knowledge::{ContactInfo, KnowledgeBase, PersonalInfo, Project, ProjectStatus};
    use crate::llm_client::{MockLLMClient, ToolCall};
    use async_openai::types::{ChatCompletionMessageToolCall, ChatCompletionToolType, FunctionCall};

    fn sample_kb() -> Arc<KnowledgeBase> {
        Arc::new(KnowledgeBase {
            personal: PersonalInfo {
                name: "Ankit Kumar".to_string(),
                title: "AI/ML Engineer".to_string(),
                tagline: "Tagline".to_string(),
                introduction: "Intro".to_string(),
                interests: vec![],
                aspirations: "Aspirations".to_string(),
            },
            contact: ContactInfo {
                email: "ankits1802@gmail.com".to_string(),
                linkedin: String::new(),
                github: String::new(),
                medium: String::new(),
                leetcode: String::new(),
                resume: String::new(),
            },
            projects: vec![Project {
                id: "project-autosql".to_string(),
                title: "AutoSQL: Text-to-SQL Query Generation".to_string(),
                description: "Fine-tuned LLM with RAG for complex SQL queries".to_string(),
                tags: vec!["Python".to_string(), "PyTorch".to_string()],
                general_details: "Fine-tunes a 6.7B parameter model.".to_string(),
                tools_and_methods: vec!["LoRA and QLoRA adapters".to_string()],
                results: "23% accuracy boost.".to_string(),
                learnings: "Parameter-efficient tuning works.".to_string(),
                live_demo_url: None,
                repo_url: Some("https://github.com/ankits1802/AutoSQL".to_string()),
                case_study_blog_slug: None,
                timeline: Some("Aug. 2024 - May 2025".to_string()),
                status: Some(ProjectStatus::Ongoing),
                metrics: None,
            }],
            experience: vec![],
            education: vec![],
            skills: vec![],
            publications: vec![],
            achievements: vec![],
        })
    }

    fn orchestrator_with(
        llm: MockLLMClient,
        documents: MockDocumentAnalyst,
        speech: MockSpeechSynthesizer,
    ) -> Orchestrator {
        Orchestrator::new(
            Arc::new(llm),
            Arc::new(ToolRegistry::new(sample_kb())),
            Arc::new(documents),
            Arc::new(speech),
            "You are Alex.".to_string(),
            "Answer only from the document.".to_string(),
        )
    }

    fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ChatCompletionMessageToolCall {
            id: id.to_string(),
            r#type: ChatCompletionToolType::Function,
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    fn is_tool_message(message: &ChatCompletionRequestMessage) -> bool {
        matches!(message, ChatCompletionRequestMessage::Tool(_))
    }

    #[tokio::test]
    async fn test_direct_text_response() {
        let mut llm = MockLLMClient::new();
        llm.expect_decide_action()
            .times(1)
            .returning(|_, _| Ok(LLMAction::TextResponse("Hello! Ask me anything.".into())));

        let orchestrator =
            orchestrator_with(llm, MockDocumentAnalyst::new(), MockSpeechSynthesizer::new());
        let answer = orchestrator
            .answer_from_knowledge("Who are you?", &[])
            .await
            .unwrap();
        assert_eq!(answer, "Hello! Ask me anything.");
    }

    #[tokio::test]
    async fn test_tool_results_are_fed_back() {
        let mut llm = MockLLMClient::new();
        llm.expect_decide_action()
            .times(2)
            .returning(|messages, tools| {
                assert_eq!(tools.len(), 9);
                if messages.iter().any(is_tool_message) {
                    let has_contact_payload = messages.iter().any(|m| {
                        matches!(m, ChatCompletionRequestMessage::Tool(t)
                            if format!("{:?}", t.content).contains("ankits1802@gmail.com"))
                    });
                    assert!(has_contact_payload);
                    Ok(LLMAction::TextResponse(
                        "You can reach Ankit at ankits1802@gmail.com.".into(),
                    ))
                } else {
                    Ok(LLMAction::ToolCall(vec![tool_call(
                        "call-1",
                        "getContactInfo",
                        "{}",
                    )]))
                }
            });

        let orchestrator =
            orchestrator_with(llm, MockDocumentAnalyst::new(), MockSpeechSynthesizer::new());
        let answer = orchestrator
            .answer_from_knowledge("How can I contact you?", &[])
            .await
            .unwrap();
        assert!(answer.contains("ankits1802@gmail.com"));
    }

    #[tokio::test]
    async fn test_list_projects_answer_enumerates_titles() {
        let mut llm = MockLLMClient::new();
        llm.expect_decide_action()
            .times(2)
            .returning(|messages, _| {
                if messages.iter().any(is_tool_message) {
                    let has_title = messages.iter().any(|m| {
                        matches!(m, ChatCompletionRequestMessage::Tool(t)
                            if format!("{:?}", t.content)
                                .contains("AutoSQL: Text-to-SQL Query Generation"))
                    });
                    assert!(has_title);
                    Ok(LLMAction::TextResponse(
                        "Ankit has built AutoSQL: Text-to-SQL Query Generation.".into(),
                    ))
                } else {
                    Ok(LLMAction::ToolCall(vec![tool_call(
                        "call-1",
                        "listProjects",
                        "{}",
                    )]))
                }
            });

        let orchestrator =
            orchestrator_with(llm, MockDocumentAnalyst::new(), MockSpeechSynthesizer::new());
        let answer = orchestrator
            .answer_from_knowledge("What projects have you built?", &[])
            .await
            .unwrap();
        assert!(answer.contains("AutoSQL: Text-to-SQL Query Generation"));
    }

    #[tokio::test]
    async fn test_unknown_project_title_feeds_back_null() {
        let mut llm = MockLLMClient::new();
        llm.expect_decide_action()
            .times(2)
            .returning(|messages, _| {
                if messages.iter().any(is_tool_message) {
                    let saw_null = messages.iter().any(|m| {
                        matches!(m, ChatCompletionRequestMessage::Tool(t)
                            if format!("{:?}", t.content).contains("null"))
                    });
                    assert!(saw_null);
                    Ok(LLMAction::TextResponse(
                        "I don't have a project called Quantum Chess.".into(),
                    ))
                } else {
                    Ok(LLMAction::ToolCall(vec![tool_call(
                        "call-1",
                        "getProjectDetails",
                        r#"{"title": "Quantum Chess"}"#,
                    )]))
                }
            });

        let orchestrator =
            orchestrator_with(llm, MockDocumentAnalyst::new(), MockSpeechSynthesizer::new());
        let answer = orchestrator
            .answer_from_knowledge("Tell me about Quantum Chess", &[])
            .await
            .unwrap();
        assert_eq!(answer, "I don't have a project called Quantum Chess.");
    }

    #[tokio::test]
    async fn test_tool_errors_are_reported_not_fatal() {
        let mut llm = MockLLMClient::new();
        llm.expect_decide_action()
            .times(2)
            .returning(|messages, _| {
                if messages.iter().any(is_tool_message) {
                    let saw_error = messages.iter().any(|m| {
                        matches!(m, ChatCompletionRequestMessage::Tool(t)
                            if format!("{:?}", t.content).contains("Unknown tool"))
                    });
                    assert!(saw_error);
                    Ok(LLMAction::TextResponse(
                        "I don't have a tool for that.".into(),
                    ))
                } else {
                    Ok(LLMAction::ToolCall(vec![tool_call(
                        "call-1",
                        "getSecrets",
                        "{}",
                    )]))
                }
            });

        let orchestrator =
            orchestrator_with(llm, MockDocumentAnalyst::new(), MockSpeechSynthesizer::new());
        let answer = orchestrator
            .answer_from_knowledge("Tell me a secret", &[])
            .await
            .unwrap();
        assert_eq!(answer, "I don't have a tool for that.");
    }

    #[tokio::test]
    async fn test_round_limit_yields_fallback() {
        let mut llm = MockLLMClient::new();
        llm.expect_decide_action()
            .times(MAX_TOOL_ROUNDS)
            .returning(|_, _| {
                Ok(LLMAction::ToolCall(vec![tool_call(
                    "call-n",
                    "getPersonalInfo",
                    "{}",
                )]))
            });

        let orchestrator =
            orchestrator_with(llm, MockDocumentAnalyst::new(), MockSpeechSynthesizer::new());
        let answer = orchestrator
            .answer_from_knowledge("Loop forever", &[])
            .await
            .unwrap();
        assert_eq!(answer, FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn test_empty_model_text_yields_fallback() {
        let mut llm = MockLLMClient::new();
        llm.expect_decide_action()
            .times(1)
            .returning(|_, _| Ok(LLMAction::TextResponse("   ".into())));

        let orchestrator =
            orchestrator_with(llm, MockDocumentAnalyst::new(), MockSpeechSynthesizer::new());
        let answer = orchestrator.answer_from_knowledge("Hi", &[]).await.unwrap();
        assert_eq!(answer, FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_llm_call() {
        // No expectations set: any LLM call would panic the test.
        let orchestrator = orchestrator_with(
            MockLLMClient::new(),
            MockDocumentAnalyst::new(),
            MockSpeechSynthesizer::new(),
        );
        let err = orchestrator
            .answer_from_knowledge("   ", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidInput(_)));
        assert_eq!(
            err.to_string(),
            "Query is required and must be a non-empty string"
        );
    }

    #[tokio::test]
    async fn test_history_turns_precede_query() {
        let mut llm = MockLLMClient::new();
        llm.expect_decide_action()
            .times(1)
            .returning(|messages, _| {
                // System turn, two history turns, then the new query.
                assert_eq!(messages.len(), 4);
                assert!(matches!(
                    messages[0],
                    ChatCompletionRequestMessage::System(_)
                ));
                assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
                assert!(matches!(
                    messages[2],
                    ChatCompletionRequestMessage::Assistant(_)
                ));
                assert!(matches!(messages[3], ChatCompletionRequestMessage::User(_)));
                Ok(LLMAction::TextResponse("Sure.".into()))
            });

        let history = vec![
            ConversationTurn::user("List your projects"),
            ConversationTurn::assistant("Here they are."),
        ];
        let orchestrator =
            orchestrator_with(llm, MockDocumentAnalyst::new(), MockSpeechSynthesizer::new());
        orchestrator
            .answer_from_knowledge("Tell me more", &history)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_document_answer_happy_path() {
        let mut documents = MockDocumentAnalyst::new();
        documents
            .expect_analyze()
            .times(1)
            .returning(|blob, _, query| {
                assert_eq!(blob.mime_type, "text/plain");
                assert_eq!(query, "Summarize this");
                Ok("A short summary.".to_string())
            });

        let orchestrator =
            orchestrator_with(MockLLMClient::new(), documents, MockSpeechSynthesizer::new());
        let answer = orchestrator
            .answer_from_document("data:text/plain;base64,aGVsbG8=", "Summarize this")
            .await
            .unwrap();
        assert_eq!(answer, "A short summary.");
    }

    #[tokio::test]
    async fn test_document_rejects_plain_url() {
        let orchestrator = orchestrator_with(
            MockLLMClient::new(),
            MockDocumentAnalyst::new(),
            MockSpeechSynthesizer::new(),
        );
        let err = orchestrator
            .answer_from_document("https://example.com/doc.pdf", "Summarize")
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidInput(_)));
        assert_eq!(err.to_string(), "Invalid document data URI format");
    }

    #[tokio::test]
    async fn test_document_empty_answer_yields_fallback() {
        let mut documents = MockDocumentAnalyst::new();
        documents
            .expect_analyze()
            .times(1)
            .returning(|_, _, _| Ok(String::new()));

        let orchestrator =
            orchestrator_with(MockLLMClient::new(), documents, MockSpeechSynthesizer::new());
        let answer = orchestrator
            .answer_from_document("data:text/plain;base64,aGVsbG8=", "Summarize")
            .await
            .unwrap();
        assert_eq!(answer, DOCUMENT_FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn test_speech_synthesis_produces_wav() {
        let mut speech = MockSpeechSynthesizer::new();
        speech
            .expect_synthesize()
            .times(1)
            .returning(|_| Ok(vec![0u8; 4800]));

        let orchestrator =
            orchestrator_with(MockLLMClient::new(), MockDocumentAnalyst::new(), speech);
        let wav = orchestrator.synthesize_speech("Hello there").await.unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(wav.len(), 44 + 4800);
    }

    #[tokio::test]
    async fn test_speech_rejects_oversized_text() {
        let orchestrator = orchestrator_with(
            MockLLMClient::new(),
            MockDocumentAnalyst::new(),
            MockSpeechSynthesizer::new(),
        );
        let text = "a".repeat(MAX_SPEECH_CHARS + 1);
        let err = orchestrator.synthesize_speech(&text).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Text is too long for speech synthesis (max 5000 characters)"
        );
    }

    #[tokio::test]
    async fn test_speech_rejects_empty_text() {
        let orchestrator = orchestrator_with(
            MockLLMClient::new(),
            MockDocumentAnalyst::new(),
            MockSpeechSynthesizer::new(),
        );
        let err = orchestrator.synthesize_speech("  ").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidInput(_)));
    }
}
