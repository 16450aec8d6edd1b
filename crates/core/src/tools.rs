//! Retrieval tools the dialogue model can call while answering a question.
//!
//! Dispatch is a closed enum over the known tool set. Unknown names and
//! malformed arguments are reported as typed errors so the orchestrator can
//! feed them back to the model instead of failing the turn.

use crate::knowledge::KnowledgeBase;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    ListProjects,
    GetProjectDetails,
    GetExperience,
    GetEducation,
    GetCertifications,
    GetSkills,
    GetPublicationsAndAchievements,
    GetContactInfo,
    GetPersonalInfo,
}

impl ToolName {
    pub const ALL: [ToolName; 9] = [
        ToolName::ListProjects,
        ToolName::GetProjectDetails,
        ToolName::GetExperience,
        ToolName::GetEducation,
        ToolName::GetCertifications,
        ToolName::GetSkills,
        ToolName::GetPublicationsAndAchievements,
        ToolName::GetContactInfo,
        ToolName::GetPersonalInfo,
    ];

    /// The wire name the model calls the tool by.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ListProjects => "listProjects",
            ToolName::GetProjectDetails => "getProjectDetails",
            ToolName::GetExperience => "getExperience",
            ToolName::GetEducation => "getEducation",
            ToolName::GetCertifications => "getCertifications",
            ToolName::GetSkills => "getSkills",
            ToolName::GetPublicationsAndAchievements => "getPublicationsAndAchievements",
            ToolName::GetContactInfo => "getContactInfo",
            ToolName::GetPersonalInfo => "getPersonalInfo",
        }
    }

    pub fn parse(name: &str) -> Option<ToolName> {
        Self::ALL.iter().copied().find(|t| t.as_str() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolName::ListProjects => {
                "Get a list of all projects with their titles, descriptions, and key details."
            }
            ToolName::GetProjectDetails => {
                "Get detailed information about a specific project by its title."
            }
            ToolName::GetExperience => "Get the complete professional work experience.",
            ToolName::GetEducation => {
                "Get the complete educational background, including degrees and certifications."
            }
            ToolName::GetCertifications => {
                "Get all certifications and professional credentials."
            }
            ToolName::GetSkills => {
                "Get a comprehensive list of skills, organized by category with proficiency levels."
            }
            ToolName::GetPublicationsAndAchievements => {
                "Get publications and achievements with complete details."
            }
            ToolName::GetContactInfo => {
                "Get the complete contact information and social media links."
            }
            ToolName::GetPersonalInfo => {
                "Get personal information, introduction, interests, and aspirations."
            }
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments {
        tool: &'static str,
        message: String,
    },
}

/// Arguments for the `getProjectDetails` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetProjectDetailsArgs {
    /// The title of the project, matched ignoring case.
    pub title: String,
}

/// A tool made available to the dialogue model: its wire name, a description,
/// and a JSON schema for its arguments.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Executes retrieval tools against the shared knowledge base.
pub struct ToolRegistry {
    kb: Arc<KnowledgeBase>,
}

impl ToolRegistry {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }

    /// Descriptors for every tool in the registry, in a stable order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        ToolName::ALL
            .iter()
            .map(|tool| ToolDescriptor {
                name: tool.as_str(),
                description: tool.description(),
                parameters: match tool {
                    ToolName::GetProjectDetails => {
                        serde_json::to_value(schemars::schema_for!(GetProjectDetailsArgs))
                            .unwrap_or_else(|_| empty_object_schema())
                    }
                    _ => empty_object_schema(),
                },
            })
            .collect()
    }

    /// Runs a tool by wire name with raw JSON arguments.
    ///
    /// Zero-argument tools accept an empty string or any JSON object.
    pub fn dispatch(&self, name: &str, arguments: &str) -> Result<Value, ToolError> {
        let tool = ToolName::parse(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        match tool {
            ToolName::ListProjects => Ok(Value::Array(
                self.kb
                    .projects
                    .iter()
                    .map(|p| {
                        json!({
                            "title": p.title,
                            "description": p.description,
                            "tags": p.tags,
                            "repoUrl": p.repo_url,
                            "liveDemoUrl": p.live_demo_url,
                            "timeline": p.timeline,
                            "status": p.status,
                        })
                    })
                    .collect(),
            )),
            ToolName::GetProjectDetails => {
                let args: GetProjectDetailsArgs = parse_args(tool, arguments)?;
                match self.kb.project_by_title(&args.title) {
                    // The detail view mirrors the summary fields plus narrative
                    // sections; implementation notes stay internal.
                    Some(p) => Ok(json!({
                        "id": p.id,
                        "title": p.title,
                        "description": p.description,
                        "tags": p.tags,
                        "generalDetails": p.general_details,
                        "results": p.results,
                        "learnings": p.learnings,
                        "liveDemoUrl": p.live_demo_url,
                        "repoUrl": p.repo_url,
                        "caseStudyBlogSlug": p.case_study_blog_slug,
                        "timeline": p.timeline,
                        "status": p.status,
                        "metrics": p.metrics,
                    })),
                    None => Ok(Value::Null),
                }
            }
            ToolName::GetExperience => to_json(&self.kb.experience),
            ToolName::GetEducation => to_json(&self.kb.education),
            ToolName::GetCertifications => to_json(&self.kb.certifications()),
            ToolName::GetSkills => to_json(&self.kb.skills),
            ToolName::GetPublicationsAndAchievements => Ok(json!({
                "publications": self.kb.publications,
                "achievements": self.kb.achievements,
            })),
            ToolName::GetContactInfo => to_json(&self.kb.contact),
            ToolName::GetPersonalInfo => to_json(&self.kb.personal),
        }
    }
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn parse_args<T: for<'de> Deserialize<'de>>(
    tool: ToolName,
    arguments: &str,
) -> Result<T, ToolError> {
    let raw = if arguments.trim().is_empty() {
        "{}"
    } else {
        arguments
    };
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
        tool: tool.as_str(),
        message: e.to_string(),
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, ToolError> {
    // Serialization of in-memory records cannot fail for these types.
    Ok(serde_json::to_value(value).unwrap_or(Value::Null))
}
