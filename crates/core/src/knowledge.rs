//! The typed, read-only knowledge base backing the assistant's retrieval tools.
//!
//! All records are loaded once at startup from a JSON file and shared behind an
//! `Arc`. Nothing here mutates after load.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Completed,
    Ongoing,
    Archived,
}

/// Quantitative outcomes attached to a project. All fields are free-form
/// display strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_improvement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance_gains: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_reduction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_parameters: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_latency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub general_details: String,
    #[serde(default)]
    pub tools_and_methods: Vec<String>,
    pub results: String,
    pub learnings: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_demo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_study_blog_slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ProjectMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub role: String,
    pub company: String,
    pub duration: String,
    pub description: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationEntry {
    pub institution: String,
    pub degree: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgpa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevant_coursework: Option<BTreeMap<String, String>>,
    pub is_certification: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCategory {
    pub category: String,
    pub skills: Vec<Skill>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    pub title: String,
    pub venue: String,
    pub date: String,
    pub description: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub title: String,
    pub issuer: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub association: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub email: String,
    pub linkedin: String,
    pub github: String,
    pub medium: String,
    pub leetcode: String,
    pub resume: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub name: String,
    pub title: String,
    pub tagline: String,
    pub introduction: String,
    pub interests: Vec<String>,
    pub aspirations: String,
}

/// The full portfolio dataset, as deserialized from the knowledge JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBase {
    pub personal: PersonalInfo,
    pub contact: ContactInfo,
    pub projects: Vec<Project>,
    pub experience: Vec<Experience>,
    pub education: Vec<EducationEntry>,
    pub skills: Vec<SkillCategory>,
    #[serde(default)]
    pub publications: Vec<Publication>,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
}

impl KnowledgeBase {
    /// Loads and validates the knowledge base from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read knowledge file at {}", path.display()))?;
        let kb: KnowledgeBase = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse knowledge file at {}", path.display()))?;
        Ok(kb)
    }

    /// Finds a project by title, ignoring case. Returns `None` on a miss.
    pub fn project_by_title(&self, title: &str) -> Option<&Project> {
        self.projects
            .iter()
            .find(|p| p.title.eq_ignore_ascii_case(title))
    }

    /// Education entries that are certifications rather than degrees.
    pub fn certifications(&self) -> Vec<&EducationEntry> {
        self.education
            .iter()
            .filter(|entry| entry.is_certification)
            .collect()
    }
}
