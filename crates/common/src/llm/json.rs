//! Pull a JSON object out of a model reply

/// Slice from the first `{` to the last `}`.
///
/// Models wrap JSON in code fences or prose often enough that strict parsing
/// of the whole reply is not useful.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
