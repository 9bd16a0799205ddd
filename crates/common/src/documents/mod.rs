//! Uploaded document extraction contract
//!
//! Types for the structured data pulled out of an uploaded document, the
//! classification prompt sent to the model and the tolerant reply parser.

mod extraction;

pub use extraction::{
    build_extraction_prompt, parse_extraction_response, ExtractionParseError, ExtractionResult,
    EXTRACTION_SYSTEM_PROMPT,
};

use serde::{Deserialize, Deserializer, Serialize};

/// Upload types accepted by the document endpoint
pub const ALLOWED_MIME_TYPES: [&str; 4] = [
    "application/pdf",
    "text/plain",
    "text/markdown",
    "text/csv",
];

pub fn is_allowed_mime_type(mime_type: &str) -> bool {
    let base = mime_type.split(';').next().unwrap_or_default().trim();
    ALLOWED_MIME_TYPES
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(base))
}

/// Keep at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedContact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEquipment {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub quantity: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UtilityShutoff {
    #[serde(default)]
    pub utility: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFacilityInfo {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub building_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub square_footage: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub floors: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub occupancy: Option<String>,
    #[serde(default)]
    pub exits: Vec<String>,
    #[serde(default)]
    pub assembly_points: Vec<String>,
    #[serde(default)]
    pub utilities: Vec<UtilityShutoff>,
}

impl ExtractedFacilityInfo {
    pub fn is_empty(&self) -> bool {
        self.address.is_none()
            && self.building_type.is_none()
            && self.square_footage.is_none()
            && self.floors.is_none()
            && self.occupancy.is_none()
            && self.exits.is_empty()
            && self.assembly_points.is_empty()
            && self.utilities.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedProcedure {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// Structured data stored in `documents.extracted_data`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    #[serde(default)]
    pub contacts: Vec<ExtractedContact>,
    #[serde(default)]
    pub equipment: Vec<ExtractedEquipment>,
    #[serde(default)]
    pub facility_info: Option<ExtractedFacilityInfo>,
    #[serde(default)]
    pub procedures: Vec<ExtractedProcedure>,
}

impl ExtractedData {
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
            && self.equipment.is_empty()
            && self.procedures.is_empty()
            && self.facility_info.as_ref().map_or(true, |f| f.is_empty())
    }
}

/// Accept strings, numbers or null where a short text field is expected
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_types() {
        assert!(is_allowed_mime_type("application/pdf"));
        assert!(is_allowed_mime_type("text/plain; charset=utf-8"));
        assert!(is_allowed_mime_type("Text/CSV"));
        assert!(!is_allowed_mime_type("image/png"));
        assert!(!is_allowed_mime_type(""));
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn test_lenient_numbers() {
        let equipment: ExtractedEquipment =
            serde_json::from_str(r#"{"name":"Extinguisher","quantity":4}"#).unwrap();
        assert_eq!(equipment.quantity.as_deref(), Some("4"));

        let contact: ExtractedContact =
            serde_json::from_str(r#"{"name":"Dana","phone":null}"#).unwrap();
        assert_eq!(contact.phone, None);
    }

    #[test]
    fn test_empty_data() {
        assert!(ExtractedData::default().is_empty());
        let data = ExtractedData {
            facility_info: Some(ExtractedFacilityInfo::default()),
            ..Default::default()
        };
        assert!(data.is_empty());
    }
}
