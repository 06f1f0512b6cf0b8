//! Parse-or-degrade readers for free-form model replies
//!
//! Models are asked for JSON but may wrap it in prose or code fences, drop
//! fields, or answer in plain text. Each reader extracts what it can and
//! fills every missing field with a fixed default. None of them fail.

use serde_json::Value;

use super::{AgeEstimate, Comparison, SnailAnalysis};

const FALLBACK_EXPLANATION_CHARS: usize = 200;

/// Find the JSON object in a model reply
///
/// Accepts bare JSON, fenced ```json blocks, or an object embedded in prose.
pub fn extract_json_object(content: &str) -> Option<serde_json::Map<String, Value>> {
    let trimmed = content.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str(trimmed) {
        return Some(map);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }

    match serde_json::from_str(&trimmed[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Read a comparison reply. Confidence is clamped to 0-100.
pub fn parse_comparison(content: &str) -> Comparison {
    let Some(map) = extract_json_object(content) else {
        return Comparison::unable_to_compare();
    };

    let Some(confidence) = map.get("confidence").and_then(number_0_100) else {
        return Comparison::unable_to_compare();
    };

    let reasoning = map
        .get("reasoning")
        .or_else(|| map.get("rationale"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("no reasoning given")
        .to_string();

    Comparison {
        confidence,
        reasoning,
    }
}

/// Read an analysis reply
pub fn parse_analysis(content: &str) -> SnailAnalysis {
    let map = extract_json_object(content).unwrap_or_default();

    SnailAnalysis {
        species: string_field(&map, &["species"]).unwrap_or_else(|| "Unknown".to_string()),
        age: string_field(&map, &["age", "approxAge"]).unwrap_or_else(|| "unknown".to_string()),
        age_explanation: string_field(&map, &["ageExplanation", "explanation"])
            .unwrap_or_else(|| "Unable to determine age".to_string()),
        age_confidence: string_field(&map, &["ageConfidence", "confidence"])
            .unwrap_or_else(|| "low".to_string()),
        distinctive_features: map
            .get("distinctiveFeatures")
            .map(features)
            .unwrap_or_default(),
    }
}

/// Read an age-estimate reply
///
/// Without JSON the raw reply (truncated) becomes the explanation.
pub fn parse_age_estimate(content: &str) -> AgeEstimate {
    match extract_json_object(content) {
        Some(map) => AgeEstimate {
            approx_age_label: string_field(&map, &["age"]).unwrap_or_else(|| "unknown".to_string()),
            explanation: string_field(&map, &["explanation"])
                .unwrap_or_else(|| "Unable to determine age".to_string()),
            confidence: string_field(&map, &["confidence"]).unwrap_or_else(|| "low".to_string()),
        },
        None => AgeEstimate {
            approx_age_label: "unknown".to_string(),
            explanation: content.chars().take(FALLBACK_EXPLANATION_CHARS).collect(),
            confidence: "low".to_string(),
        },
    }
}

fn string_field(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn number_0_100(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(0.0, 100.0) as u8)
}

fn features(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
