//! Structural completeness score for generated plans

use super::model::Section;

/// Section id fragments every complete plan is expected to contain
pub const REQUIRED_SECTION_IDS: [&str; 6] = [
    "executive-summary",
    "purpose",
    "emergency-contact",
    "chain-of-command",
    "evacuation",
    "communication",
];

const REQUIRED_WEIGHT: f64 = 40.0;
const DEPTH_WEIGHT: f64 = 30.0;
const SUBSECTION_WEIGHT: f64 = 20.0;
const VOLUME_WEIGHT: f64 = 10.0;

const TARGET_AVG_SECTION_CHARS: f64 = 500.0;
const TARGET_TOTAL_CHARS: f64 = 5000.0;

const MIN_SECTIONS: usize = 5;
const MIN_RAW_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceReport {
    /// 0-100
    pub score: u8,
    pub warnings: Vec<String>,
}

/// Required ids matched by at least one section id
pub fn required_sections_found(sections: &[Section]) -> usize {
    REQUIRED_SECTION_IDS
        .iter()
        .filter(|required| sections.iter().any(|s| s.id.contains(*required)))
        .count()
}

/// Score parsed sections and collect non-fatal warnings about the raw text
pub fn score_sections(sections: &[Section], raw: &str) -> ConfidenceReport {
    let mut warnings = Vec::new();

    if sections.len() < MIN_SECTIONS {
        warnings.push(format!(
            "Only {} sections were generated (expected at least {})",
            sections.len(),
            MIN_SECTIONS
        ));
    }

    let raw_chars = raw.chars().count();
    if raw_chars < MIN_RAW_CHARS {
        warnings.push(format!(
            "Generated plan is unusually short ({} characters)",
            raw_chars
        ));
    }

    if sections.is_empty() {
        return ConfidenceReport { score: 0, warnings };
    }

    let found = required_sections_found(sections) as f64;
    let required = REQUIRED_WEIGHT * found / REQUIRED_SECTION_IDS.len() as f64;

    let total_chars: usize = sections.iter().map(Section::content_len).sum();
    let avg_chars = total_chars as f64 / sections.len() as f64;
    let depth = DEPTH_WEIGHT * (avg_chars / TARGET_AVG_SECTION_CHARS).min(1.0);

    let nested = if sections.iter().any(|s| !s.subsections.is_empty()) {
        SUBSECTION_WEIGHT
    } else {
        0.0
    };

    let volume = VOLUME_WEIGHT * (total_chars as f64 / TARGET_TOTAL_CHARS).min(1.0);

    let score = (required + depth + nested + volume).round().clamp(0.0, 100.0) as u8;

    ConfidenceReport { score, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::model::Subsection;

    fn section(title: &str, chars: usize) -> Section {
        Section::new(title, "x".repeat(chars))
    }

    #[test]
    fn test_empty_scores_zero_with_warnings() {
        let report = score_sections(&[], "");
        assert_eq!(report.score, 0);
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_complete_plan_scores_100() {
        let mut sections = vec![
            section("Executive Summary", 900),
            section("Purpose and Scope", 900),
            section("Emergency Contacts", 900),
            section("Chain of Command", 900),
            section("Evacuation Procedures", 900),
            section("Communication Plan", 900),
        ];
        sections[4].subsections.push(Subsection {
            id: "routes".into(),
            title: "Routes".into(),
            content: "x".repeat(100),
        });

        let raw = "y".repeat(6000);
        let report = score_sections(&sections, &raw);
        assert_eq!(report.score, 100);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_partial_required_sections() {
        // 3 of 6 required, avg 250 chars, no subsections, total 1000 chars
        let sections = vec![
            section("Executive Summary", 250),
            section("Evacuation Routes", 250),
            section("Communication", 250),
            section("Appendix", 250),
        ];
        let report = score_sections(&sections, &"y".repeat(2000));

        // 20 + 15 + 0 + 2
        assert_eq!(report.score, 37);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_required_matching_is_substring() {
        let sections = vec![section("Emergency Contact List", 10)];
        assert_eq!(required_sections_found(&sections), 1);

        let sections = vec![section("Contacts", 10)];
        assert_eq!(required_sections_found(&sections), 0);
    }

    #[test]
    fn test_score_is_bounded_for_huge_input() {
        let sections: Vec<_> = (0..50)
            .map(|i| section(&format!("Executive Summary {i}"), 100_000))
            .collect();
        let report = score_sections(&sections, "");
        assert!(report.score <= 100);
    }
}
