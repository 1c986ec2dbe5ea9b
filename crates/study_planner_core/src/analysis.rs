//! crates/study_planner_core/src/analysis.rs
//!
//! Turns a task description into a prompt for the language model, parses the
//! model's JSON reply and substitutes a static analysis whenever anything goes
//! wrong.

use std::sync::Arc;
use tracing::{debug, error};

use crate::domain::{AiAnalysis, ContextualAction, Difficulty, Priority, Resource, ResourceType};
use crate::ports::{CompletionService, PortError};

const PROMPT_TEMPLATE: &str = r#"Analyze this study/work task and suggest how to get it done.

Task: "{task}"
Priority: {priority}

IMPORTANT: Reply with ONLY a valid JSON object. No additional text, no markdown formatting, no code blocks.

Use exactly this JSON shape:
{
  "summary": "Short analysis of what the task involves",
  "suggestedSteps": ["Step 1", "Step 2", "Step 3"],
  "estimatedTime": "Realistic estimate such as '30 minutes', '2-3 hours' or '1 week'",
  "difficulty": "Easy",
  "resources": [
    { "title": "Resource name", "url": "https://example.com", "type": "article" }
  ],
  "tips": ["Tip 1", "Tip 2"],
  "contextualActions": [
    {
      "type": "productivity",
      "label": "Create template",
      "description": "Create a template for similar tasks",
      "url": "https://docs.google.com/document/create"
    }
  ]
}

Requirements:
- 3-5 realistic, actionable steps
- 2-4 relevant online resources with real URLs (prefer educational sites such as Khan Academy, Coursera or MDN)
- 3-5 practical tips for finishing the task efficiently
- "difficulty" must be "Easy", "Medium" or "Hard"
- take the priority level into account when suggesting an approach
- resource "type" must be "article", "video", "documentation" or "course"
- 1-3 contextual actions naming digital tools or services that would help with this specific task

Return only the JSON object."#;

/// Why a model reply could not be used.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("completion request failed: {0}")]
    Completion(#[from] PortError),
    #[error("reply is not a valid analysis object: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("reply is missing required field '{0}'")]
    Incomplete(&'static str),
}

pub fn build_prompt(task_text: &str, priority: Priority) -> String {
    PROMPT_TEMPLATE
        .replace("{task}", task_text)
        .replace("{priority}", priority.as_str())
}

/// Removes a surrounding markdown code fence (```` ```json ```` or ```` ``` ````).
/// Replies without a leading fence are only trimmed.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let body = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        return trimmed;
    };
    let body = body.trim_start();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parses and validates a raw model reply.
pub fn parse_analysis(raw: &str) -> Result<AiAnalysis, AnalysisError> {
    let json = strip_code_fence(raw);
    debug!(cleaned = %json, "Parsing analysis reply");
    let analysis: AiAnalysis = serde_json::from_str(json)?;

    if analysis.summary.trim().is_empty() {
        return Err(AnalysisError::Incomplete("summary"));
    }
    if analysis.suggested_steps.is_empty() {
        return Err(AnalysisError::Incomplete("suggestedSteps"));
    }
    if analysis.estimated_time.trim().is_empty() {
        return Err(AnalysisError::Incomplete("estimatedTime"));
    }
    Ok(analysis)
}

/// The analysis shown whenever the model cannot be used.
pub fn fallback_analysis() -> AiAnalysis {
    AiAnalysis {
        summary: "Unable to analyze task at the moment. Please try again later.".to_string(),
        suggested_steps: vec![
            "Break down the task into smaller, manageable parts".to_string(),
            "Set a specific time and place to work on it".to_string(),
            "Gather all necessary resources and materials".to_string(),
            "Create a simple plan or checklist".to_string(),
            "Start with the easiest part to build momentum".to_string(),
        ],
        estimated_time: "Varies based on complexity".to_string(),
        difficulty: Difficulty::Medium,
        resources: vec![
            Resource {
                title: "Effective Study Strategies - Coursera".to_string(),
                url: "https://www.coursera.org/articles/study-tips".to_string(),
                resource_type: ResourceType::Article,
            },
            Resource {
                title: "Time Management Techniques".to_string(),
                url: "https://www.khanacademy.org/college-careers-more/career-content/productivity-and-time-management".to_string(),
                resource_type: ResourceType::Course,
            },
        ],
        tips: vec![
            "Take regular breaks using the Pomodoro Technique (25 min work, 5 min break)".to_string(),
            "Stay organized with a clear workspace and materials".to_string(),
            "Set realistic goals and celebrate small wins".to_string(),
            "Ask for help when you get stuck".to_string(),
            "Review and reflect on your progress regularly".to_string(),
        ],
        contextual_actions: Some(vec![
            ContextualAction {
                action_type: "productivity".to_string(),
                label: "Create a checklist".to_string(),
                description: "Use a task management tool to organize your work".to_string(),
                url: Some("https://docs.google.com/document/create".to_string()),
            },
            ContextualAction {
                action_type: "time-management".to_string(),
                label: "Set a timer".to_string(),
                description: "Use Pomodoro technique for focused work sessions".to_string(),
                url: Some("https://pomofocus.io".to_string()),
            },
        ]),
    }
}

/// Runs task analyses against a language model.
#[derive(Clone)]
pub struct TaskAnalyzer {
    completion: Arc<dyn CompletionService>,
}

impl TaskAnalyzer {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    /// Single attempt, no retry. Errors are surfaced to the caller.
    pub async fn try_analyze(
        &self,
        task_text: &str,
        priority: Priority,
    ) -> Result<AiAnalysis, AnalysisError> {
        let prompt = build_prompt(task_text, priority);
        let raw = self.completion.complete(&prompt).await?;
        debug!(raw = %raw, "Raw analysis reply");
        parse_analysis(&raw)
    }

    /// Never fails: any error is logged and replaced by [`fallback_analysis`].
    pub async fn analyze(&self, task_text: &str, priority: Priority) -> AiAnalysis {
        match self.try_analyze(task_text, priority).await {
            Ok(analysis) => analysis,
            Err(e) => {
                error!(error = %e, "Task analysis failed, using fallback analysis");
                fallback_analysis()
            }
        }
    }
}
