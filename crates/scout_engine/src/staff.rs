const LABEL_SCORES: [(&str, u32); 14] = [
    ("our team", 100),
    ("meet the team", 95),
    ("meet our team", 95),
    ("team", 90),
    ("providers", 90),
    ("doctors", 85),
    ("physicians", 85),
    ("staff", 80),
    ("veterinarians", 80),
    ("provider", 75),
    ("doctor", 75),
    ("meet", 60),
    ("about us", 10),
    ("about", 5),
];

const STAFF_URL_KEYWORDS: [&str; 11] = [
    "our-team",
    "team",
    "providers",
    "provider",
    "doctors",
    "physicians",
    "veterinarians",
    "vets",
    "our-doctors",
    "meet-the-team",
    "meet-our-team",
];

const MEET_COMPANIONS: [&str; 6] = [
    "team",
    "doctor",
    "provider",
    "staff",
    "physician",
    "veterinarian",
];

/// How strongly a link label suggests a staff page: the best keyword the
/// label contains, 0 when none.
pub fn score_staff_label(label: &str) -> u32 {
    let label = label.trim().to_lowercase();
    if label.is_empty() {
        return 0;
    }
    LABEL_SCORES
        .iter()
        .filter(|(keyword, _)| label.contains(keyword))
        .map(|(_, score)| *score)
        .max()
        .unwrap_or(0)
}

pub fn likely_staff_url(url: &str) -> bool {
    let url = url.to_lowercase();
    if url.is_empty() {
        return false;
    }
    if STAFF_URL_KEYWORDS.iter().any(|k| url.contains(k)) {
        return true;
    }
    url.contains("meet") && MEET_COMPANIONS.iter().any(|k| url.contains(k))
}
