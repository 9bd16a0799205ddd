use super::ExtractedData;
use crate::llm::extract_json_object;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification labels the model may return
const DOCUMENT_TYPES: [&str; 7] = [
    "emergency_plan",
    "contact_list",
    "floor_plan",
    "equipment_inventory",
    "procedure",
    "insurance",
    "other",
];

pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are an assistant that reads facility \
documents for emergency planning. You classify the document and extract only facts that \
are explicitly present in it. Never invent names, phone numbers or quantities. Respond \
with a single JSON object and nothing else.";

#[derive(Debug, Error)]
pub enum ExtractionParseError {
    #[error("No JSON object found in model reply")]
    MissingJson,

    #[error("Malformed extraction JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parsed model answer for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default = "default_document_type")]
    pub document_type: String,

    /// 0.0 - 1.0
    #[serde(default)]
    pub confidence: f64,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(flatten)]
    pub data: ExtractedData,
}

fn default_document_type() -> String {
    "other".to_string()
}

/// Build the user prompt for one document's text
pub fn build_extraction_prompt(filename: &str, text: &str) -> String {
    format!(
        "Classify the document below and extract emergency-planning data.\n\n\
         Return JSON with exactly these keys:\n\
         {{\n\
         \x20 \"document_type\": one of {types},\n\
         \x20 \"confidence\": number between 0 and 1,\n\
         \x20 \"summary\": one sentence,\n\
         \x20 \"contacts\": [{{\"name\", \"role\", \"phone\", \"email\"}}],\n\
         \x20 \"equipment\": [{{\"name\", \"location\", \"quantity\", \"notes\"}}],\n\
         \x20 \"facility_info\": {{\"address\", \"building_type\", \"square_footage\", \"floors\", \
         \"occupancy\", \"exits\": [], \"assembly_points\": [], \
         \"utilities\": [{{\"utility\", \"location\", \"contact\"}}]}},\n\
         \x20 \"procedures\": [{{\"title\", \"steps\": []}}]\n\
         }}\n\
         Use empty arrays or null for anything the document does not contain.\n\n\
         Filename: {filename}\n\n\
         Document text:\n\"\"\"\n{text}\n\"\"\"",
        types = DOCUMENT_TYPES.join(", "),
        filename = filename,
        text = text,
    )
}

/// Parse the model reply, tolerating code fences and surrounding prose
pub fn parse_extraction_response(reply: &str) -> Result<ExtractionResult, ExtractionParseError> {
    let json = extract_json_object(reply).ok_or(ExtractionParseError::MissingJson)?;
    let mut result: ExtractionResult = serde_json::from_str(json)?;

    result.document_type = result.document_type.trim().to_lowercase();
    if !DOCUMENT_TYPES.contains(&result.document_type.as_str()) {
        result.document_type = default_document_type();
    }
    result.confidence = if result.confidence.is_finite() {
        result.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };

    // Rows without a name carry nothing we can merge
    result.data.contacts.retain(|c| !c.name.trim().is_empty());
    result.data.equipment.retain(|e| !e.name.trim().is_empty());
    result
        .data
        .procedures
        .retain(|p| !p.title.trim().is_empty() || !p.steps.is_empty());

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_reply() {
        let reply = r#"Here is the extraction:
```json
{
  "document_type": "Contact_List",
  "confidence": 1.7,
  "contacts": [
    {"name": "City Fire Dept", "role": "Fire", "phone": "911"},
    {"name": "", "role": "ghost"}
  ],
  "equipment": [{"name": "AED", "location": "Front desk", "quantity": 1}],
  "facility_info": null,
  "procedures": []
}
```"#;
        let result = parse_extraction_response(reply).unwrap();

        assert_eq!(result.document_type, "contact_list");
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.data.contacts.len(), 1);
        assert_eq!(result.data.equipment[0].quantity.as_deref(), Some("1"));
        assert!(result.data.facility_info.is_none());
    }

    #[test]
    fn test_unknown_type_becomes_other() {
        let result = parse_extraction_response(r#"{"document_type":"menu"}"#).unwrap();
        assert_eq!(result.document_type, "other");
        assert!(result.data.is_empty());
    }

    #[test]
    fn test_missing_json() {
        assert!(matches!(
            parse_extraction_response("I could not read this file."),
            Err(ExtractionParseError::MissingJson)
        ));
        assert!(matches!(
            parse_extraction_response("{not json}"),
            Err(ExtractionParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_prompt_mentions_filename_and_text() {
        let prompt = build_extraction_prompt("contacts.csv", "Name,Phone");
        assert!(prompt.contains("Filename: contacts.csv"));
        assert!(prompt.contains("Name,Phone"));
        assert!(prompt.contains("equipment_inventory"));
    }
}
