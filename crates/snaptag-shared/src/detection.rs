//! Defensive parsing of vision model output.
//!
//! The model is asked for a JSON array of `{ "name", "x", "y" }` entries but
//! answers in free-form text. Parsing degrades in three steps: the embedded
//! JSON array, then keyword heuristics without coordinates, then a single
//! placeholder object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::PLACEHOLDER_OBJECT_NAME;
use crate::types::{clamp_percent, normalize_name};

const MAX_HEURISTIC_WORDS: usize = 4;
const MAX_HEURISTIC_LEN: usize = 40;

/// One object reported by the vision model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub name: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
}

impl Detection {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            x: None,
            y: None,
        }
    }

    pub fn has_ai_coordinates(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }
}

/// Which parsing step produced the detections.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParseSource {
    Json,
    Heuristic,
    Placeholder,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedDetections {
    pub detections: Vec<Detection>,
    pub source: ParseSource,
}

/// Parse a vision model reply. Never fails and never returns an empty list.
pub fn parse_detections(text: &str) -> ParsedDetections {
    if let Some(detections) = parse_json_array(text).filter(|d| !d.is_empty()) {
        return ParsedDetections {
            detections,
            source: ParseSource::Json,
        };
    }

    let mut names = quoted_names(text);
    if names.is_empty() {
        names = list_phrases(text);
    }
    let heuristic = dedupe(names.into_iter());
    if !heuristic.is_empty() {
        return ParsedDetections {
            detections: heuristic.into_iter().map(Detection::named).collect(),
            source: ParseSource::Heuristic,
        };
    }

    ParsedDetections {
        detections: vec![Detection::named(PLACEHOLDER_OBJECT_NAME)],
        source: ParseSource::Placeholder,
    }
}

// ---------------------------------------------------------------------------
// Step 1: embedded JSON array
// ---------------------------------------------------------------------------

fn parse_json_array(text: &str) -> Option<Vec<Detection>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }

    let items: Vec<Value> = serde_json::from_str(&text[start..=end]).ok()?;

    let mut seen = Vec::new();
    let mut detections = Vec::new();
    for item in &items {
        let Some(detection) = detection_from_value(item) else {
            continue;
        };
        let key = detection.name.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        detections.push(detection);
    }
    Some(detections)
}

fn detection_from_value(value: &Value) -> Option<Detection> {
    match value {
        Value::String(s) => normalize_name(s).map(Detection::named),
        Value::Object(map) => {
            let name = ["name", "object", "label"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))
                .and_then(normalize_name)?;

            let position = map.get("position").and_then(Value::as_object);
            let coord = |axis: &str| {
                map.get(axis)
                    .or_else(|| position.and_then(|p| p.get(axis)))
                    .and_then(percent_from_value)
            };

            let (x, y) = match (coord("x"), coord("y")) {
                (Some(x), Some(y)) => (Some(x), Some(y)),
                _ => (None, None),
            };

            Some(Detection { name, x, y })
        }
        _ => None,
    }
}

fn percent_from_value(value: &Value) -> Option<f32> {
    let raw = match value {
        Value::Number(n) => n.as_f64()? as f32,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f32>().ok()?,
        _ => return None,
    };
    clamp_percent(raw)
}

// ---------------------------------------------------------------------------
// Step 2: keyword heuristics
// ---------------------------------------------------------------------------

/// Collect `"name": "..."` values from malformed JSON.
fn quoted_names(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = text;
    while let Some(idx) = rest.find("\"name\"") {
        rest = &rest[idx + "\"name\"".len()..];
        let after_colon = match rest.trim_start().strip_prefix(':') {
            Some(r) => r.trim_start(),
            None => continue,
        };
        let Some(value) = after_colon.strip_prefix('"') else {
            continue;
        };
        if let Some(close) = value.find('"') {
            if let Some(name) = normalize_name(&value[..close]) {
                names.push(name);
            }
        }
    }
    names
}

/// Short phrases from bulleted or numbered lines, or from a single
/// comma-separated line.
fn list_phrases(text: &str) -> Vec<String> {
    let bulleted: Vec<&str> = text.lines().filter_map(strip_bullet).collect();

    let candidates: Vec<&str> = if !bulleted.is_empty() {
        bulleted
    } else {
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        match lines.as_slice() {
            &[single] if single.contains(',') => single.split(',').collect(),
            _ => Vec::new(),
        }
    };

    candidates.into_iter().filter_map(clean_phrase).collect()
}

fn strip_bullet(line: &str) -> Option<&str> {
    let line = line.trim();
    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return Some(rest);
        }
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") "))
}

fn clean_phrase(raw: &str) -> Option<String> {
    let phrase = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '*')
        .trim_end_matches(['.', ';', ':'])
        .trim();

    if phrase.is_empty()
        || phrase.len() > MAX_HEURISTIC_LEN
        || phrase.split_whitespace().count() > MAX_HEURISTIC_WORDS
        || !phrase.chars().any(char::is_alphabetic)
        || phrase.contains(['{', '}', '[', ']', '"', ':'])
    {
        return None;
    }
    normalize_name(phrase)
}

fn dedupe(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = Vec::new();
    let mut out = Vec::new();
    for name in names {
        let key = name.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(name);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json() {
        let parsed = parse_detections(r#"[{"name":"mug","x":25,"y":60.5}]"#);
        assert_eq!(parsed.source, ParseSource::Json);
        assert_eq!(
            parsed.detections,
            vec![Detection {
                name: "mug".into(),
                x: Some(25.0),
                y: Some(60.5)
            }]
        );
        assert!(parsed.detections[0].has_ai_coordinates());
    }

    #[test]
    fn parses_json_wrapped_in_prose_and_fences() {
        let text = "Sure! Here are the objects:\n```json\n[\n  {\"object\": \"Laptop\", \"x\": \"40%\", \"y\": \"130\"},\n  {\"label\": \"pen\"}\n]\n```\nLet me know.";
        let parsed = parse_detections(text);
        assert_eq!(parsed.source, ParseSource::Json);
        assert_eq!(parsed.detections.len(), 2);
        assert_eq!(parsed.detections[0].name, "Laptop");
        assert_eq!(parsed.detections[0].x, Some(40.0));
        assert_eq!(parsed.detections[0].y, Some(100.0));
        assert!(!parsed.detections[1].has_ai_coordinates());
    }

    #[test]
    fn nested_position_and_half_coordinates() {
        let text = r#"[{"name":"lamp","position":{"x":10,"y":20}},{"name":"rug","x":5}]"#;
        let parsed = parse_detections(text);
        assert_eq!(parsed.detections[0].x, Some(10.0));
        assert_eq!(parsed.detections[0].y, Some(20.0));
        assert_eq!(parsed.detections[1].x, None);
        assert_eq!(parsed.detections[1].y, None);
    }

    #[test]
    fn json_drops_nameless_and_duplicate_entries() {
        let text = r#"[{"x":1,"y":2},{"name":"Cup"},{"name":"cup"},"plant",3]"#;
        let parsed = parse_detections(text);
        let names: Vec<_> = parsed.detections.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Cup", "plant"]);
    }

    #[test]
    fn falls_back_to_quoted_names() {
        let text = r#"[{"name": "chair", "x": 10, "y": }, {"name": "table""#;
        let parsed = parse_detections(text);
        assert_eq!(parsed.source, ParseSource::Heuristic);
        let names: Vec<_> = parsed.detections.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["chair", "table"]);
        assert!(parsed.detections.iter().all(|d| !d.has_ai_coordinates()));
    }

    #[test]
    fn falls_back_to_bullet_list() {
        let text = "I can see the following:\n- coffee mug\n- notebook.\n2) desk lamp\n- a very long sentence that describes nothing in particular at all";
        let parsed = parse_detections(text);
        assert_eq!(parsed.source, ParseSource::Heuristic);
        let names: Vec<_> = parsed.detections.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["coffee mug", "notebook", "desk lamp"]);
    }

    #[test]
    fn falls_back_to_comma_line() {
        let parsed = parse_detections("keys, wallet, phone");
        let names: Vec<_> = parsed.detections.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["keys", "wallet", "phone"]);
    }

    #[test]
    fn placeholder_when_nothing_usable() {
        for text in ["", "[]", "I'm sorry, I cannot analyze this image right now."] {
            let parsed = parse_detections(text);
            assert_eq!(parsed.source, ParseSource::Placeholder, "input: {text:?}");
            assert_eq!(parsed.detections, vec![Detection::named(PLACEHOLDER_OBJECT_NAME)]);
        }
    }
}
