//! Merging extracted document data into plan sections

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::debug;
use uuid::Uuid;

use super::model::{Section, SectionMetadata};
use crate::documents::{
    ExtractedContact, ExtractedData, ExtractedEquipment, ExtractedFacilityInfo, ExtractedProcedure,
};

pub const DOCUMENT_IMPORT_SOURCE: &str = "document_import";

/// Extracted data category a user can apply to a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Contacts,
    Procedures,
    FacilityInfo,
    Equipment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Overwrite the section body
    Replace,
    /// Add below the existing body after a `---` rule
    Append,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Contacts => "contacts",
            Category::Procedures => "procedures",
            Category::FacilityInfo => "facility_info",
            Category::Equipment => "equipment",
        }
    }

    /// Lowercase title fragments identifying the section this category lands in
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Category::Contacts => &["emergency contact", "key personnel"],
            Category::FacilityInfo => &[
                "facility information",
                "facility overview",
                "facility description",
            ],
            Category::Procedures => &["emergency procedure", "response procedure"],
            Category::Equipment => &["equipment", "emergency supplies"],
        }
    }

    pub fn mode(&self) -> MergeMode {
        match self {
            Category::Contacts | Category::FacilityInfo => MergeMode::Replace,
            Category::Procedures | Category::Equipment => MergeMode::Append,
        }
    }

    pub fn default_title(&self) -> &'static str {
        match self {
            Category::Contacts => "Emergency Contacts",
            Category::FacilityInfo => "Facility Information",
            Category::Procedures => "Emergency Procedures",
            Category::Equipment => "Emergency Equipment & Supplies",
        }
    }

    /// Rendered markdown and extracted payload, or `None` when the document
    /// has nothing for this category
    fn render(&self, data: &ExtractedData) -> Option<(String, serde_json::Value, usize)> {
        match self {
            Category::Contacts if !data.contacts.is_empty() => Some((
                render_contacts(&data.contacts),
                serde_json::to_value(&data.contacts).unwrap_or_default(),
                data.contacts.len(),
            )),
            Category::Procedures if !data.procedures.is_empty() => Some((
                render_procedures(&data.procedures),
                serde_json::to_value(&data.procedures).unwrap_or_default(),
                data.procedures.len(),
            )),
            Category::Equipment if !data.equipment.is_empty() => Some((
                render_equipment(&data.equipment),
                serde_json::to_value(&data.equipment).unwrap_or_default(),
                data.equipment.len(),
            )),
            Category::FacilityInfo => data
                .facility_info
                .as_ref()
                .filter(|info| !info.is_empty())
                .map(|info| {
                    (
                        render_facility_info(info),
                        serde_json::to_value(info).unwrap_or_default(),
                        1,
                    )
                }),
            _ => None,
        }
    }
}

/// One category written into the plan
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedCategory {
    pub category: Category,
    pub section_title: String,
    /// A new section was appended instead of updating an existing one
    pub created: bool,
    pub item_count: usize,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub sections: Vec<Section>,
    pub applied: Vec<AppliedCategory>,
    /// Selected categories the document had no data for
    pub skipped: Vec<Category>,
}

/// First section whose title contains one of the category keywords
pub fn find_category_section(sections: &[Section], category: Category) -> Option<usize> {
    sections.iter().position(|s| {
        let title = s.title.to_lowercase();
        category.keywords().iter().any(|k| title.contains(k))
    })
}

/// Merge the selected categories of `data` into `sections`
pub fn merge_document(
    mut sections: Vec<Section>,
    data: &ExtractedData,
    categories: &[Category],
    document_id: Uuid,
) -> MergeOutcome {
    let mut applied = Vec::new();
    let mut skipped = Vec::new();
    let mut seen = Vec::new();

    for &category in categories {
        if seen.contains(&category) {
            continue;
        }
        seen.push(category);

        let Some((rendered, payload, item_count)) = category.render(data) else {
            skipped.push(category);
            continue;
        };

        let metadata = SectionMetadata {
            source: DOCUMENT_IMPORT_SOURCE.to_string(),
            document_id: Some(document_id),
            added_via_chat: false,
            updated_at: Utc::now(),
        };

        let (section_title, created) = match find_category_section(&sections, category) {
            Some(index) => {
                let section = &mut sections[index];
                section.content = match category.mode() {
                    MergeMode::Replace => rendered,
                    MergeMode::Append if section.content.trim().is_empty() => rendered,
                    MergeMode::Append => {
                        format!("{}\n\n---\n\n{}", section.content.trim_end(), rendered)
                    }
                };
                section.metadata = Some(metadata);
                (section.title.clone(), false)
            }
            None => {
                let mut section = Section::new(category.default_title(), rendered);
                section.metadata = Some(metadata);
                sections.push(section);
                (category.default_title().to_string(), true)
            }
        };

        debug!(
            category = category.as_str(),
            section = %section_title,
            created,
            items = item_count,
            "Merged document data into plan"
        );

        applied.push(AppliedCategory {
            category,
            section_title,
            created,
            item_count,
            payload,
        });
    }

    MergeOutcome {
        sections,
        applied,
        skipped,
    }
}

fn cell(value: Option<&str>) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v.replace('|', "/").replace('\n', " "),
        None => "-".to_string(),
    }
}

fn table(headers: &[&str], rows: impl IntoIterator<Item = Vec<String>>) -> String {
    let mut out = format!("| {} |\n", headers.join(" | "));
    let _ = writeln!(
        out,
        "|{}|",
        headers.iter().map(|_| "------").collect::<Vec<_>>().join("|")
    );
    for row in rows {
        let _ = writeln!(out, "| {} |", row.join(" | "));
    }
    out.trim_end().to_string()
}

pub fn render_contacts(contacts: &[ExtractedContact]) -> String {
    table(
        &["Name", "Role", "Phone", "Email"],
        contacts.iter().map(|c| {
            vec![
                cell(Some(&c.name)),
                cell(c.role.as_deref()),
                cell(c.phone.as_deref()),
                cell(c.email.as_deref()),
            ]
        }),
    )
}

pub fn render_equipment(equipment: &[ExtractedEquipment]) -> String {
    table(
        &["Equipment", "Location", "Quantity", "Notes"],
        equipment.iter().map(|e| {
            vec![
                cell(Some(&e.name)),
                cell(e.location.as_deref()),
                cell(e.quantity.as_deref()),
                cell(e.notes.as_deref()),
            ]
        }),
    )
}

pub fn render_procedures(procedures: &[ExtractedProcedure]) -> String {
    procedures
        .iter()
        .map(|p| {
            let title = if p.title.trim().is_empty() {
                "Procedure"
            } else {
                p.title.trim()
            };
            let mut block = format!("### {}", title);
            for (i, step) in p.steps.iter().enumerate() {
                let _ = write!(block, "\n{}. {}", i + 1, step.trim());
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_facility_info(info: &ExtractedFacilityInfo) -> String {
    let mut facts = Vec::new();
    let mut fact = |label: &str, value: Option<&String>| {
        if let Some(v) = value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
            facts.push(format!("- **{}:** {}", label, v));
        }
    };
    fact("Address", info.address.as_ref());
    fact("Building type", info.building_type.as_ref());
    fact("Square footage", info.square_footage.as_ref());
    fact("Floors", info.floors.as_ref());
    fact("Occupancy", info.occupancy.as_ref());

    if !info.exits.is_empty() {
        facts.push(format!("- **Exits:** {}", info.exits.join(", ")));
    }
    if !info.assembly_points.is_empty() {
        facts.push(format!(
            "- **Assembly points:** {}",
            info.assembly_points.join(", ")
        ));
    }

    let mut out = facts.join("\n");
    if !info.utilities.is_empty() {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str("**Utility Shutoffs**\n\n");
        out.push_str(&table(
            &["Utility", "Shutoff Location", "Contact"],
            info.utilities.iter().map(|u| {
                vec![
                    cell(Some(&u.utility)),
                    cell(u.location.as_deref()),
                    cell(u.contact.as_deref()),
                ]
            }),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::UtilityShutoff;
    use crate::plan::blocks::{parse_blocks, table_rows};

    fn data() -> ExtractedData {
        ExtractedData {
            contacts: vec![
                ExtractedContact {
                    name: "Dana Lee".into(),
                    role: Some("Owner".into()),
                    phone: Some("555-0100".into()),
                    email: None,
                },
                ExtractedContact {
                    name: "City FD".into(),
                    role: Some("Fire".into()),
                    phone: Some("911".into()),
                    email: None,
                },
            ],
            equipment: vec![ExtractedEquipment {
                name: "AED".into(),
                location: Some("Front desk".into()),
                quantity: Some("1".into()),
                notes: None,
            }],
            facility_info: None,
            procedures: vec![ExtractedProcedure {
                title: "Gas Leak".into(),
                steps: vec!["Do not flip switches".into(), "Evacuate".into()],
            }],
        }
    }

    fn plan() -> Vec<Section> {
        vec![
            Section::new("Emergency Contacts", "| Name | Phone |\n|---|---|\n| Old | 1 |"),
            Section::new("Emergency Equipment", "Fire extinguishers by each exit."),
            Section::new("Evacuation", "Leave."),
        ]
    }

    #[test]
    fn test_contacts_replace_existing_section() {
        let doc = Uuid::new_v4();
        let outcome = merge_document(plan(), &data(), &[Category::Contacts], doc);

        let contacts = &outcome.sections[0];
        assert!(!contacts.content.contains("Old"));
        let rows = table_rows(&parse_blocks(&contacts.content))
            .into_iter()
            .map(|r| r.to_vec())
            .collect::<Vec<_>>();
        assert_eq!(rows[0], vec!["Dana Lee", "Owner", "555-0100", "-"]);
        assert_eq!(rows.len(), 2);

        let meta = contacts.metadata.as_ref().unwrap();
        assert_eq!(meta.source, DOCUMENT_IMPORT_SOURCE);
        assert_eq!(meta.document_id, Some(doc));
        assert!(!outcome.applied[0].created);
    }

    #[test]
    fn test_equipment_appends_with_separator() {
        let outcome = merge_document(plan(), &data(), &[Category::Equipment], Uuid::new_v4());
        let content = &outcome.sections[1].content;
        assert!(content.starts_with("Fire extinguishers by each exit.\n\n---\n\n| Equipment |"));
        assert!(content.contains("| AED | Front desk | 1 | - |"));
    }

    #[test]
    fn test_procedures_create_default_section() {
        let outcome = merge_document(plan(), &data(), &[Category::Procedures], Uuid::new_v4());
        let added = outcome.sections.last().unwrap();

        assert_eq!(outcome.sections.len(), 4);
        assert_eq!(added.title, "Emergency Procedures");
        assert_eq!(
            added.content,
            "### Gas Leak\n1. Do not flip switches\n2. Evacuate"
        );
        assert!(outcome.applied[0].created);
    }

    #[test]
    fn test_empty_category_is_skipped() {
        let outcome = merge_document(
            plan(),
            &data(),
            &[Category::FacilityInfo, Category::Contacts, Category::Contacts],
            Uuid::new_v4(),
        );
        assert_eq!(outcome.skipped, vec![Category::FacilityInfo]);
        assert_eq!(outcome.applied.len(), 1);
    }

    #[test]
    fn test_facility_info_render() {
        let info = ExtractedFacilityInfo {
            address: Some("1 Main St".into()),
            floors: Some("2".into()),
            assembly_points: vec!["North lot".into()],
            utilities: vec![UtilityShutoff {
                utility: "Gas".into(),
                location: Some("Rear wall".into()),
                contact: Some("PSE | 24h".into()),
            }],
            ..Default::default()
        };
        let rendered = render_facility_info(&info);
        assert!(rendered.starts_with("- **Address:** 1 Main St\n- **Floors:** 2\n- **Assembly points:** North lot"));
        assert!(rendered.contains("| Gas | Rear wall | PSE / 24h |"));
    }
}
