//! Section mutator for chat-driven edits
//!
//! Applies one structured [`EditIntent`] to a plan's section list and
//! reports what changed in plain language. Dynamic text from the user or the
//! model is only ever matched literally.

use chrono::Utc;
use regex_lite::{NoExpand, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use super::model::{Section, SectionMetadata};
use super::slug::slugify;

/// Edit operations the chat editor can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditAction {
    RemoveContact,
    ModifyText,
    AddSection,
    RemoveSection,
    UpdateSection,
}

impl EditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditAction::RemoveContact => "remove_contact",
            EditAction::ModifyText => "modify_text",
            EditAction::AddSection => "add_section",
            EditAction::RemoveSection => "remove_section",
            EditAction::UpdateSection => "update_section",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditDetails {
    #[serde(default)]
    pub search_for: Option<String>,
    #[serde(default)]
    pub replace_with: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub new_title: Option<String>,
}

/// Structured edit produced from a chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditIntent {
    pub action: EditAction,
    #[serde(default)]
    pub section_title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub details: EditDetails,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Models send `"details": null` for actions that need none
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub sections: Vec<Section>,
    pub changes: Vec<String>,
}

impl EditOutcome {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Index of the first section whose title contains `title`, ignoring case
pub fn find_section(sections: &[Section], title: &str) -> Option<usize> {
    let needle = title.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    sections
        .iter()
        .position(|s| s.title.to_lowercase().contains(&needle))
}

/// Apply an edit intent, returning the full updated section list
pub fn apply_edit(mut sections: Vec<Section>, intent: &EditIntent) -> EditOutcome {
    let mut changes = Vec::new();
    let title = intent.section_title.as_deref().unwrap_or_default();

    if intent.action == EditAction::AddSection {
        let new_title = intent
            .details
            .new_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(title)
            .trim();

        if new_title.is_empty() {
            warn!("add_section intent without a title");
        } else {
            let mut section = Section::new(
                new_title,
                intent.details.content.clone().unwrap_or_default(),
            );
            section.metadata = Some(SectionMetadata {
                source: "chat".to_string(),
                document_id: None,
                added_via_chat: true,
                updated_at: Utc::now(),
            });
            sections.push(section);
            changes.push(format!("Added section \"{}\"", new_title));
        }
        return EditOutcome { sections, changes };
    }

    let Some(index) = find_section(&sections, title) else {
        warn!(section_title = %title, action = ?intent.action, "No section matched edit intent");
        return EditOutcome { sections, changes };
    };

    debug!(index, title = %sections[index].title, action = ?intent.action, "Applying edit");

    match intent.action {
        EditAction::RemoveContact => {
            let search = intent.details.search_for.as_deref().unwrap_or_default();
            let section = &mut sections[index];
            if let Some(removed) = remove_matching_lines(&mut section.content, search) {
                changes.push(format!(
                    "Removed {} line{} mentioning \"{}\" from \"{}\"",
                    removed,
                    if removed == 1 { "" } else { "s" },
                    search,
                    section.title
                ));
            }
        }
        EditAction::ModifyText => {
            let search = intent.details.search_for.as_deref().unwrap_or_default();
            let replace = intent.details.replace_with.as_deref().unwrap_or_default();
            let section = &mut sections[index];
            if let Some(updated) = replace_text(&section.content, search, replace) {
                section.content = updated;
                changes.push(format!(
                    "Replaced \"{}\" with \"{}\" in \"{}\"",
                    search, replace, section.title
                ));
            }
        }
        EditAction::RemoveSection => {
            let removed = sections.remove(index);
            changes.push(format!("Removed section \"{}\"", removed.title));
        }
        EditAction::UpdateSection => {
            let section = &mut sections[index];
            if let Some(content) = intent
                .details
                .content
                .as_deref()
                .filter(|c| !c.trim().is_empty())
            {
                section.content = content.to_string();
                if let Some(new_title) = intent
                    .details
                    .new_title
                    .as_deref()
                    .filter(|t| !t.trim().is_empty())
                {
                    section.title = new_title.trim().to_string();
                    section.id = slugify(&section.title);
                }
                changes.push(format!("Updated content of \"{}\"", section.title));
            }
        }
        EditAction::AddSection => unreachable!("handled above"),
    }

    EditOutcome { sections, changes }
}

/// Drop every line containing `search` (case-insensitive).
///
/// Returns the number of removed lines, or `None` when nothing matched.
pub fn remove_matching_lines(content: &mut String, search: &str) -> Option<usize> {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let before = content.lines().count();
    let kept: Vec<&str> = content
        .lines()
        .filter(|line| !line.to_lowercase().contains(&needle))
        .collect();
    let removed = before - kept.len();

    if removed == 0 {
        return None;
    }
    *content = kept.join("\n");
    Some(removed)
}

/// Replace `search` with `replace`.
///
/// Tries an exact case-insensitive match over the whole content first. When
/// that finds nothing, scans line by line with a match that ignores markdown
/// emphasis markers and whitespace runs. Returns `None` when neither pass
/// changed anything.
pub fn replace_text(content: &str, search: &str, replace: &str) -> Option<String> {
    if search.trim().is_empty() {
        return None;
    }

    let exact = RegexBuilder::new(&regex_lite::escape(search))
        .case_insensitive(true)
        .build()
        .ok()?;
    if exact.is_match(content) {
        return Some(exact.replace_all(content, NoExpand(replace)).into_owned());
    }

    let mut changed = false;
    let lines: Vec<String> = content
        .lines()
        .map(|line| match fuzzy_replace_line(line, search, replace) {
            Some(updated) => {
                changed = true;
                updated
            }
            None => line.to_string(),
        })
        .collect();

    changed.then(|| lines.join("\n"))
}

const EMPHASIS: [char; 3] = ['*', '_', '`'];

/// Lowercased comparable characters with the byte range each came from
fn normalize(text: &str) -> Vec<(char, usize, usize)> {
    let mut out: Vec<(char, usize, usize)> = Vec::new();
    let mut last_space = true;

    for (start, c) in text.char_indices() {
        let end = start + c.len_utf8();
        if EMPHASIS.contains(&c) {
            continue;
        }
        if c.is_whitespace() {
            if !last_space {
                out.push((' ', start, end));
                last_space = true;
            }
            continue;
        }
        last_space = false;
        for lower in c.to_lowercase() {
            out.push((lower, start, end));
        }
    }

    if matches!(out.last(), Some((' ', _, _))) {
        out.pop();
    }
    out
}

fn fuzzy_replace_line(line: &str, search: &str, replace: &str) -> Option<String> {
    let needle: Vec<char> = normalize(search).into_iter().map(|(c, _, _)| c).collect();
    if needle.is_empty() {
        return None;
    }

    let hay = normalize(line);
    let mut spans = Vec::new();
    let mut i = 0;
    while i + needle.len() <= hay.len() {
        let window = &hay[i..i + needle.len()];
        if window.iter().map(|(c, _, _)| *c).eq(needle.iter().copied()) {
            spans.push((window[0].1, window[window.len() - 1].2));
            i += needle.len();
        } else {
            i += 1;
        }
    }

    let mut out = String::with_capacity(line.len());
    let mut cursor = 0;
    let mut replaced = false;
    for (start, end) in spans {
        let Some((start, end)) = balance_span(line, start, end) else {
            continue;
        };
        if start < cursor {
            continue;
        }
        out.push_str(&line[cursor..start]);
        out.push_str(replace);
        cursor = end;
        replaced = true;
    }

    if !replaced {
        return None;
    }
    out.push_str(&line[cursor..]);
    Some(out)
}

/// Widen a match so no emphasis marker loses its partner.
///
/// Marker runs inside the span that pair up are dropped with it. An unpaired
/// run must have its partner directly against the span, which is swallowed
/// too; otherwise the span is rejected.
fn balance_span(line: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let inner = line[start..end].as_bytes();
    let mut unpaired: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < inner.len() {
        let b = inner[i];
        if !EMPHASIS.iter().any(|&m| m as u8 == b) {
            i += 1;
            continue;
        }
        let mut j = i;
        while j < inner.len() && inner[j] == b {
            j += 1;
        }
        let run = &line[start + i..start + j];
        if unpaired.last() == Some(&run) {
            unpaired.pop();
        } else {
            unpaired.push(run);
        }
        i = j;
    }

    let (mut start, mut end) = (start, end);
    for run in unpaired {
        if line[..start].ends_with(run) {
            start -= run.len();
        } else if line[end..].starts_with(run) {
            end += run.len();
        } else {
            return None;
        }
    }
    Some((start, end))
}
