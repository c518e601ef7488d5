use std::sync::OnceLock;

use regex::Regex;

use crate::extract::ExtractedFacts;

/// Section the assistant pointed at. `parent` is set for "Parent > Child"
/// replies naming an entry inside a dropdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavSuggestion {
    pub label: String,
    pub parent: Option<String>,
}

impl NavSuggestion {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            parent: None,
        }
    }
}

fn phone_noise() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9xX()+\-.\s]").expect("valid regex"))
}

fn first_integer() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("valid regex"))
}

/// Drop Markdown code fences and surrounding whitespace.
pub fn strip_fences(reply: &str) -> String {
    let trimmed = reply.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    trimmed
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn clean_piece(piece: &str) -> String {
    piece
        .trim()
        .trim_matches('`')
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '*')
        .trim()
        .to_string()
}

fn meaningful(value: String) -> Option<String> {
    let lower = value.to_ascii_lowercase();
    if value.is_empty() || matches!(lower.as_str(), "n/a" | "na" | "none" | "unknown" | "-" | "null") {
        None
    } else {
        Some(value)
    }
}

/// Parse a navigation reply: the first non-empty line, optionally in the
/// "Parent > Child" form.
pub fn parse_nav_reply(reply: &str) -> Option<NavSuggestion> {
    let stripped = strip_fences(reply);
    let line = stripped
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())?;
    let line = line.trim_start_matches(['-', '*', '•']).trim();

    let mut parts: Vec<String> = line
        .split(['>', '›', '→'])
        .map(|p| clean_piece(p.trim().trim_end_matches('.')))
        .filter(|p| !p.is_empty())
        .collect();
    let label = parts.pop()?;
    let parent = parts.pop();
    Some(NavSuggestion { label, parent })
}

/// Parse the `Phone, First, Last, Doctors` line. Every field is optional;
/// missing or placeholder values stay `None`.
pub fn parse_staff_reply(reply: &str) -> ExtractedFacts {
    let flat = strip_fences(reply).replace('\n', " ").replace("  ", " ");
    let mut parts: Vec<String> = flat.split(',').map(clean_piece).collect();
    parts.resize(4, String::new());

    let phone = phone_noise().replace_all(&parts[0], "").trim().to_string();
    let phone = phone
        .chars()
        .any(|c| c.is_ascii_digit())
        .then_some(phone);
    let doctor_count = first_integer()
        .find(&parts[3])
        .and_then(|m| m.as_str().parse().ok());

    ExtractedFacts {
        phone,
        owner_first: meaningful(parts[1].clone()),
        owner_last: meaningful(parts[2].clone()),
        doctor_count,
    }
}
