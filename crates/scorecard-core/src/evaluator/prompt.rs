//! Judge prompt rendering.

use serde::{Deserialize, Serialize};

use crate::domain::Metric;
use crate::judge::{JudgeRequest, PromptContext};

/// Default cap on content characters placed into a prompt.
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 8_000;

/// Appended to content cut at the prompt cap.
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated due to length...]";

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a content evaluation expert. You assess written content against one specific quality metric at a time.

Evaluate ONLY the metric described in the request. Score it from 1 to 5:
  1 - Poor: significant issues throughout
  2 - Below average: several notable issues
  3 - Average: meets basic expectations
  4 - Good: exceeds expectations in places
  5 - Excellent: exceptional quality throughout

Give detailed reasoning that refers to specific passages, quote 2-3 passages that work well,
quote 2-3 passages that need work, and offer concrete, actionable advice.

Answer with a single JSON object and nothing else:
{
  "score": 3,
  "reasoning": "...",
  "improvement_advice": "...",
  "positive_examples": ["...", "..."],
  "improvement_examples": ["...", "..."]
}"#;

const DEFAULT_USER_PROMPT: &str = r#"# Content to Evaluate

{content}

# Evaluation Metric

Metric: {metric_name}
Description: {metric_description}
Category: {category}

Evaluate this content ONLY on the "{metric_name}" metric described above and answer in the
required JSON format with score, reasoning, improvement advice, positive examples and
improvement examples."#;

/// System prompt plus a user template with `{content}`, `{metric_name}`,
/// `{metric_description}` and `{category}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            user: DEFAULT_USER_PROMPT.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Render a request scoped to exactly one metric.
    pub fn render(&self, content: &str, metric: &Metric, max_prompt_chars: usize) -> JudgeRequest {
        let context = PromptContext {
            content: truncate_for_prompt(content, max_prompt_chars),
            metric_name: metric.name.clone(),
            metric_description: metric.description.clone(),
            category: metric.category.clone(),
        };
        let user_prompt = fill(
            &self.user,
            &[
                ("content", context.content.as_str()),
                ("metric_name", context.metric_name.as_str()),
                ("metric_description", context.metric_description.as_str()),
                ("category", context.category.as_str()),
            ],
        );
        JudgeRequest {
            context,
            system_prompt: self.system.clone(),
            user_prompt,
        }
    }
}

/// Cut `content` to `max_chars` characters, appending [`TRUNCATION_MARKER`].
pub fn truncate_for_prompt(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &content[..cut]),
        None => content.to_string(),
    }
}

/// Single-pass placeholder substitution; substituted text is never rescanned.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let hit = values.iter().find_map(|(key, value)| {
            tail.strip_prefix(key)
                .and_then(|after| after.strip_prefix('}'))
                .map(|after| (*value, after))
        });
        match hit {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric() -> Metric {
        Metric {
            name: "conciseness".to_string(),
            description: "Free of filler".to_string(),
            category: "clarity".to_string(),
            weight: 1.0,
        }
    }

    #[test]
    fn renders_all_placeholders() {
        let request = PromptTemplate::default().render("Hello world.", &metric(), 100);
        assert!(request.user_prompt.contains("Hello world."));
        assert!(request.user_prompt.contains("Metric: conciseness"));
        assert!(request.user_prompt.contains("Description: Free of filler"));
        assert!(request.user_prompt.contains("Category: clarity"));
        assert!(!request.user_prompt.contains("{metric_name}"));
        assert_eq!(request.context.metric_name, "conciseness");
    }

    #[test]
    fn placeholders_inside_content_are_left_alone() {
        let template = PromptTemplate {
            system: String::new(),
            user: "{content}|{metric_name}".to_string(),
        };
        let request = template.render("see {metric_name} and {json}", &metric(), 100);
        assert_eq!(request.user_prompt, "see {metric_name} and {json}|conciseness");
    }

    #[test]
    fn long_content_is_truncated_with_marker() {
        let content = "é".repeat(20);
        let cut = truncate_for_prompt(&content, 5);
        assert_eq!(cut, format!("ééééé{TRUNCATION_MARKER}"));
        assert_eq!(truncate_for_prompt("short", 5), "short");
    }
}
