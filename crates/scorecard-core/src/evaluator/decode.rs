//! Strict decoding of free-form judge text into a judgment.
//!
//! A response either yields every required field with a valid value or it is
//! rejected. Nothing is clamped or defaulted into range.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::{MAX_SCORE, MIN_SCORE};

/// Parsed, validated judge answer for one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    pub score: u8,
    pub reasoning: String,
    pub improvement_advice: String,
    pub positive_examples: Vec<String>,
    pub improvement_examples: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("response is empty")]
    Empty,

    #[error("response contains no JSON object")]
    NoJson,

    #[error("response JSON is malformed: {0}")]
    Malformed(String),

    #[error("field '{0}' is missing")]
    MissingField(&'static str),

    #[error("field '{field}' must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("score {0} is outside the 1-5 range")]
    ScoreOutOfRange(String),

    #[error("confidence {0} is outside the 0-1 range")]
    ConfidenceOutOfRange(String),
}

/// Decode a judge response.
///
/// The JSON object is located by trying, in order: the whole text, a fenced
/// ```` ```json ```` block, then the outermost `{ ... }` slice.
pub fn decode_judgment(text: &str) -> Result<Judgment, DecodeError> {
    let object = extract_object(text)?;

    let score = parse_score(object.get("score"))?;
    let reasoning = match object.get("reasoning") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => return Err(DecodeError::MissingField("reasoning")),
        Some(_) => {
            return Err(DecodeError::WrongType {
                field: "reasoning",
                expected: "a string",
            })
        }
    };
    let improvement_advice = optional_string(&object, "improvement_advice")?;
    let positive_examples = string_list(&object, "positive_examples")?;
    let improvement_examples = string_list(&object, "improvement_examples")?;

    let mut judgment = Judgment {
        score,
        reasoning,
        improvement_advice,
        positive_examples,
        improvement_examples,
        confidence: 0.0,
    };
    judgment.confidence = match object.get("confidence") {
        None | Some(Value::Null) => completeness_confidence(&judgment),
        Some(Value::Number(n)) => {
            let value = n.as_f64().unwrap_or(f64::NAN);
            if !(0.0..=1.0).contains(&value) {
                return Err(DecodeError::ConfidenceOutOfRange(n.to_string()));
            }
            value
        }
        Some(_) => {
            return Err(DecodeError::WrongType {
                field: "confidence",
                expected: "a number",
            })
        }
    };
    Ok(judgment)
}

/// Confidence derived from how complete the judgment is, floored at 0.1.
pub fn completeness_confidence(judgment: &Judgment) -> f64 {
    let mut confidence: f64 = 1.0;
    if judgment.reasoning.is_empty() {
        confidence -= 0.3;
    }
    if judgment.improvement_advice.is_empty() {
        confidence -= 0.2;
    }
    if judgment.positive_examples.is_empty() {
        confidence -= 0.2;
    }
    if judgment.improvement_examples.is_empty() {
        confidence -= 0.2;
    }
    confidence.max(0.1)
}

fn fenced_block() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").ok())
        .as_ref()
}

fn extract_object(text: &str) -> Result<Map<String, Value>, DecodeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }

    if let Ok(Value::Object(map)) = serde_json::from_str(trimmed) {
        return Ok(map);
    }

    if let Some(captures) = fenced_block().and_then(|re| re.captures(trimmed)) {
        if let Some(body) = captures.get(1) {
            if let Ok(Value::Object(map)) = serde_json::from_str(body.as_str().trim()) {
                return Ok(map);
            }
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            match serde_json::from_str(&trimmed[start..=end]) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(DecodeError::NoJson),
                Err(e) => Err(DecodeError::Malformed(e.to_string())),
            }
        }
        _ => Err(DecodeError::NoJson),
    }
}

fn parse_score(value: Option<&Value>) -> Result<u8, DecodeError> {
    let number = match value {
        Some(Value::Number(n)) => n,
        Some(Value::Null) | None => return Err(DecodeError::MissingField("score")),
        Some(_) => {
            return Err(DecodeError::WrongType {
                field: "score",
                expected: "an integer",
            })
        }
    };

    let integral = if let Some(i) = number.as_i64() {
        i
    } else {
        match number.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 => f as i64,
            _ => {
                return Err(DecodeError::WrongType {
                    field: "score",
                    expected: "an integer",
                })
            }
        }
    };

    if integral < i64::from(MIN_SCORE) || integral > i64::from(MAX_SCORE) {
        return Err(DecodeError::ScoreOutOfRange(number.to_string()));
    }
    Ok(integral as u8)
}

fn optional_string(object: &Map<String, Value>, field: &'static str) -> Result<String, DecodeError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(_) => Err(DecodeError::WrongType {
            field,
            expected: "a string",
        }),
    }
}

fn string_list(object: &Map<String, Value>, field: &'static str) -> Result<Vec<String>, DecodeError> {
    let wrong = || DecodeError::WrongType {
        field,
        expected: "a list of strings",
    };
    let items = match object.get(field) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(wrong))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(wrong()),
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{"score": 4, "reasoning": "Tight prose.", "improvement_advice": "Cut the intro.",
        "positive_examples": ["First line"], "improvement_examples": ["Second line"]}"#;

    #[test]
    fn decodes_plain_json_with_full_confidence() {
        let judgment = decode_judgment(FULL).expect("valid judgment");
        assert_eq!(judgment.score, 4);
        assert_eq!(judgment.reasoning, "Tight prose.");
        assert_eq!(judgment.positive_examples, vec!["First line"]);
        assert_eq!(judgment.confidence, 1.0);
    }

    #[test]
    fn decodes_fenced_block_with_surrounding_chatter() {
        let text = format!("Sure! Here is my evaluation:\n```json\n{FULL}\n```\nHope this helps.");
        assert_eq!(decode_judgment(&text).unwrap().score, 4);
    }

    #[test]
    fn decodes_outermost_braces() {
        let text = format!("Evaluation follows {FULL} end");
        assert_eq!(decode_judgment(&text).unwrap().score, 4);
    }

    #[test]
    fn integer_valued_float_is_accepted() {
        let judgment = decode_judgment(r#"{"score": 5.0, "reasoning": "ok"}"#).unwrap();
        assert_eq!(judgment.score, 5);
    }

    #[test]
    fn out_of_range_scores_are_rejected_not_clamped() {
        for score in ["0", "6", "-1", "10"] {
            let text = format!(r#"{{"score": {score}, "reasoning": "r"}}"#);
            assert!(
                matches!(decode_judgment(&text), Err(DecodeError::ScoreOutOfRange(_))),
                "score {score}"
            );
        }
    }

    #[test]
    fn non_numeric_and_fractional_scores_are_rejected() {
        for score in [r#""4""#, "3.5", "true", "[4]"] {
            let text = format!(r#"{{"score": {score}, "reasoning": "r"}}"#);
            assert!(
                matches!(decode_judgment(&text), Err(DecodeError::WrongType { field: "score", .. })),
                "score {score}"
            );
        }
    }

    #[test]
    fn missing_fields_are_rejected() {
        assert_eq!(
            decode_judgment(r#"{"reasoning": "r"}"#),
            Err(DecodeError::MissingField("score"))
        );
        assert_eq!(
            decode_judgment(r#"{"score": 3}"#),
            Err(DecodeError::MissingField("reasoning"))
        );
    }

    #[test]
    fn prose_without_json_is_rejected() {
        assert_eq!(decode_judgment("I would give it a 4."), Err(DecodeError::NoJson));
        assert_eq!(decode_judgment("   "), Err(DecodeError::Empty));
        assert!(matches!(
            decode_judgment("{score: four}"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn lone_string_example_becomes_single_item() {
        let judgment = decode_judgment(
            r#"{"score": 2, "reasoning": "r", "positive_examples": "only one", "improvement_examples": []}"#,
        )
        .unwrap();
        assert_eq!(judgment.positive_examples, vec!["only one"]);
        assert!(judgment.improvement_examples.is_empty());
    }

    #[test]
    fn explicit_confidence_must_be_in_unit_interval() {
        let ok = decode_judgment(r#"{"score": 3, "reasoning": "r", "confidence": 0.42}"#).unwrap();
        assert_eq!(ok.confidence, 0.42);
        assert!(matches!(
            decode_judgment(r#"{"score": 3, "reasoning": "r", "confidence": 1.5}"#),
            Err(DecodeError::ConfidenceOutOfRange(_))
        ));
    }

    #[test]
    fn sparse_judgment_has_floored_confidence() {
        let judgment = decode_judgment(r#"{"score": 3, "reasoning": ""}"#).unwrap();
        assert!((judgment.confidence - 0.1).abs() < 1e-9);
    }
}
