//! Turning a chat message into an [`EditIntent`]

use super::model::Section;
use super::mutator::EditIntent;
use crate::llm::extract_json_object;
use thiserror::Error;

/// Reply shown when the model's answer cannot be used
pub const UNCLEAR_REQUEST_REPLY: &str = "I couldn't work out which change you want. Please be \
more specific, for example name the section and the exact text to change.";

pub const INTENT_SYSTEM_PROMPT: &str = "You translate edit requests for an emergency response \
plan into a single JSON object. You never rewrite the plan yourself and you never answer \
with anything except the JSON object.";

#[derive(Debug, Error)]
pub enum IntentParseError {
    #[error("No JSON object found in model reply")]
    MissingJson,

    #[error("Malformed edit intent: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Prompt listing the plan's section titles and the user's request
pub fn build_intent_prompt(sections: &[Section], message: &str) -> String {
    let titles = if sections.is_empty() {
        "(the plan has no sections yet)".to_string()
    } else {
        sections
            .iter()
            .map(|s| format!("- {}", s.title))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "The plan currently has these sections:\n{titles}\n\n\
         User request:\n\"{message}\"\n\n\
         Answer with JSON of this shape:\n\
         {{\"action\": \"remove_contact\" | \"modify_text\" | \"add_section\" | \"remove_section\" | \"update_section\",\n\
         \x20\"sectionTitle\": title of the section to change (for add_section, the new title),\n\
         \x20\"details\": {{\"searchFor\": text to find, \"replaceWith\": replacement text, \
         \"content\": full markdown content for add_section or update_section, \"newTitle\": optional new title}},\n\
         \x20\"explanation\": one short sentence describing the change}}\n\n\
         Rules:\n\
         - Use remove_contact to delete a person or row; searchFor is the name to remove.\n\
         - Use modify_text for small wording, phone number or name changes; copy searchFor exactly as it appears.\n\
         - Use update_section only when the whole section must be rewritten.\n\
         - sectionTitle must be one of the titles above unless the action is add_section.",
        titles = titles,
        message = message.trim(),
    )
}

/// Parse the model reply into an intent, tolerating fences and prose
pub fn parse_edit_intent(reply: &str) -> Result<EditIntent, IntentParseError> {
    let json = extract_json_object(reply).ok_or(IntentParseError::MissingJson)?;
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::mutator::EditAction;

    #[test]
    fn test_parse_plain_json() {
        let intent = parse_edit_intent(
            r#"{"action":"remove_section","sectionTitle":"Appendix","details":{}}"#,
        )
        .unwrap();
        assert_eq!(intent.action, EditAction::RemoveSection);
        assert_eq!(intent.section_title.as_deref(), Some("Appendix"));
    }

    #[test]
    fn test_parse_null_details() {
        let intent = parse_edit_intent(
            r#"{"action":"remove_section","sectionTitle":"Appendix","details":null}"#,
        )
        .unwrap();
        assert_eq!(intent.action, EditAction::RemoveSection);
        assert!(intent.details.search_for.is_none());
    }

    #[test]
    fn test_parse_with_fence_and_prose() {
        let reply = "Sure, here's the change:\n```json\n{\"action\": \"modify_text\", \"sectionTitle\": \"Contacts\", \"details\": {\"searchFor\": \"555-1234\", \"replaceWith\": \"555-9999\"}, \"explanation\": \"Update phone\"}\n```\nAnything else?";
        let intent = parse_edit_intent(reply).unwrap();
        assert_eq!(intent.action, EditAction::ModifyText);
        assert_eq!(intent.details.replace_with.as_deref(), Some("555-9999"));
        assert_eq!(intent.explanation.as_deref(), Some("Update phone"));
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(
            parse_edit_intent("I'm not sure what you mean."),
            Err(IntentParseError::MissingJson)
        ));
        assert!(matches!(
            parse_edit_intent(r#"{"action":"teleport"}"#),
            Err(IntentParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_prompt_lists_titles() {
        let sections = vec![
            Section::new("Emergency Contacts", "x"),
            Section::new("Evacuation", "y"),
        ];
        let prompt = build_intent_prompt(&sections, "  remove John  ");
        assert!(prompt.contains("- Emergency Contacts\n- Evacuation"));
        assert!(prompt.contains("\"remove John\""));
    }
}
