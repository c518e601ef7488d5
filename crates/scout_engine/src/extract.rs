use std::collections::BTreeSet;

use regex::Regex;

use crate::links::PageInventory;

/// Facts gathered for one clinic. Unresolved fields are `None` and are
/// written back as empty cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFacts {
    pub phone: Option<String>,
    pub owner_first: Option<String>,
    pub owner_last: Option<String>,
    pub doctor_count: Option<u32>,
}

impl ExtractedFacts {
    /// Enough to skip the screenshot fallback.
    pub fn is_conclusive(&self) -> bool {
        self.doctor_count.is_some() && self.owner_first.is_some()
    }

    /// Fill gaps from `other`; values already present win.
    pub fn merge_missing(self, other: ExtractedFacts) -> ExtractedFacts {
        ExtractedFacts {
            phone: self.phone.or(other.phone),
            owner_first: self.owner_first.or(other.owner_first),
            owner_last: self.owner_last.or(other.owner_last),
            doctor_count: self.doctor_count.or(other.doctor_count),
        }
    }

    /// `[website, phone, first, last, doctors]` for write-back.
    pub fn to_row(&self, website: &str) -> Vec<String> {
        vec![
            website.to_string(),
            self.phone.clone().unwrap_or_default(),
            self.owner_first.clone().unwrap_or_default(),
            self.owner_last.clone().unwrap_or_default(),
            self.doctor_count.map(|n| n.to_string()).unwrap_or_default(),
        ]
    }

    pub fn summary(&self) -> String {
        self.to_row("")[1..].join(", ")
    }
}

const NAME_STOPWORDS: [&str; 16] = [
    "our", "the", "meet", "owner", "founder", "medical", "clinic", "hospital", "animal", "dental",
    "center", "practice", "team", "about", "contact", "veterinary",
];

/// Pulls phone, owner and doctor count out of page text without the
/// assistant.
pub struct TextFactExtractor {
    phone: Regex,
    credentialed: Regex,
    titled: Regex,
    owner_line: Regex,
    name: Regex,
}

impl TextFactExtractor {
    pub fn new() -> Self {
        Self {
            phone: Regex::new(r"\(?\b\d{3}\)?[-.\s]?\d{3}[-.\s]\d{4}\b").expect("valid regex"),
            credentialed: Regex::new(
                r"\b([A-Z][a-z]+)(?:\s+[A-Z]\.)?\s+([A-Z][A-Za-z'\-]+),?\s+(?:DVM|VMD|MD|M\.D\.|DO|D\.O\.|DDS|DMD|OD|O\.D\.|DPM|DC|BVSc|MRCVS)\b",
            )
            .expect("valid regex"),
            titled: Regex::new(r"\bDr\.?\s+([A-Z][a-z]+)(?:\s+[A-Z]\.)?\s+([A-Z][A-Za-z'\-]+)")
                .expect("valid regex"),
            owner_line: Regex::new(r"(?i)\b(owner|founder|founded by|co-founder|proprietor)\b")
                .expect("valid regex"),
            name: Regex::new(r"\b([A-Z][a-z]+)(?:\s+[A-Z]\.)?\s+([A-Z][A-Za-z'\-]+)")
                .expect("valid regex"),
        }
    }

    pub fn extract(&self, page: &PageInventory) -> ExtractedFacts {
        let phone = page
            .tel_numbers()
            .next()
            .or_else(|| self.phone.find(&page.text).map(|m| m.as_str().trim().to_string()));

        let doctors = self.doctor_names(&page.text);
        let doctor_count = (!doctors.is_empty()).then_some(doctors.len() as u32);

        let (owner_first, owner_last) = match self.owner_name(&page.text) {
            Some((first, last)) => (Some(first), Some(last)),
            None => (None, None),
        };

        ExtractedFacts {
            phone,
            owner_first,
            owner_last,
            doctor_count,
        }
    }

    /// Distinct "First Last" names carrying a doctor title or credential.
    fn doctor_names(&self, text: &str) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for re in [&self.credentialed, &self.titled] {
            for caps in re.captures_iter(text) {
                let first = &caps[1];
                let last = &caps[2];
                if is_stopword(first) || is_stopword(last) {
                    continue;
                }
                names.insert(format!("{} {}", first, last).to_lowercase());
            }
        }
        names
    }

    /// First plausible person name on a line mentioning ownership.
    fn owner_name(&self, text: &str) -> Option<(String, String)> {
        text.lines()
            .filter(|line| self.owner_line.is_match(line))
            .find_map(|line| {
                self.name.captures_iter(line).find_map(|caps| {
                    let first = caps[1].to_string();
                    let last = caps[2].to_string();
                    (!is_stopword(&first) && !is_stopword(&last)).then_some((first, last))
                })
            })
    }
}

impl Default for TextFactExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn is_stopword(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    NAME_STOPWORDS.contains(&lower.as_str())
}
