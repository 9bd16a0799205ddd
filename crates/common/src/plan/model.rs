//! Plan content types persisted as JSON on the plan row

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::blocks::{parse_blocks, Block};

/// Facility category used to pick a prompt template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityType {
    Office,
    Retail,
    Healthcare,
    Manufacturing,
    Warehouse,
    Education,
    Restaurant,
    Hospitality,
    Other,
}

impl FacilityType {
    pub fn label(&self) -> &'static str {
        match self {
            FacilityType::Office => "Office",
            FacilityType::Retail => "Retail",
            FacilityType::Healthcare => "Healthcare",
            FacilityType::Manufacturing => "Manufacturing",
            FacilityType::Warehouse => "Warehouse / Distribution",
            FacilityType::Education => "Education",
            FacilityType::Restaurant => "Restaurant / Food Service",
            FacilityType::Hospitality => "Hospitality",
            FacilityType::Other => "Other",
        }
    }
}

/// Headcount bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrganizationSize {
    #[serde(rename = "1-10")]
    Micro,
    #[serde(rename = "11-50")]
    Small,
    #[serde(rename = "51-200")]
    Medium,
    #[serde(rename = "201-500")]
    Large,
    #[serde(rename = "500+")]
    Enterprise,
}

impl OrganizationSize {
    pub fn label(&self) -> &'static str {
        match self {
            OrganizationSize::Micro => "1-10 employees",
            OrganizationSize::Small => "11-50 employees",
            OrganizationSize::Medium => "51-200 employees",
            OrganizationSize::Large => "201-500 employees",
            OrganizationSize::Enterprise => "500+ employees",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hazard {
    Fire,
    Earthquake,
    Flood,
    Hurricane,
    Tornado,
    SevereWeather,
    ActiveShooter,
    ChemicalSpill,
    PowerOutage,
    MedicalEmergency,
    BombThreat,
    CyberAttack,
    Pandemic,
}

impl Hazard {
    pub fn label(&self) -> &'static str {
        match self {
            Hazard::Fire => "Fire",
            Hazard::Earthquake => "Earthquake",
            Hazard::Flood => "Flood",
            Hazard::Hurricane => "Hurricane",
            Hazard::Tornado => "Tornado",
            Hazard::SevereWeather => "Severe weather",
            Hazard::ActiveShooter => "Active shooter / armed intruder",
            Hazard::ChemicalSpill => "Hazardous material / chemical spill",
            Hazard::PowerOutage => "Power outage",
            Hazard::MedicalEmergency => "Medical emergency",
            Hazard::BombThreat => "Bomb threat",
            Hazard::CyberAttack => "Cyber attack",
            Hazard::Pandemic => "Pandemic / infectious disease",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceFramework {
    Osha,
    Nfpa,
    Fema,
    Hipaa,
    JointCommission,
    Iso22301,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Location {
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,

    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Infrastructure {
    pub floors: Option<u32>,
    pub square_footage: Option<u32>,
    pub exits: Option<u32>,
    pub has_sprinklers: Option<bool>,
    pub has_generator: Option<bool>,
    #[serde(default)]
    pub assembly_points: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Personnel {
    pub employees: Option<u32>,
    pub daily_visitors: Option<u32>,
    pub mobility_impaired_occupants: Option<bool>,
    #[serde(default)]
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub weekdays: Option<String>,
    pub weekends: Option<String>,
    #[serde(default)]
    pub always_open: bool,
}

/// Questionnaire answers a plan is generated from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_other_type"))]
pub struct FacilityProfile {
    #[validate(length(min = 1, max = 200, message = "Facility name is required"))]
    pub name: String,

    #[serde(rename = "type")]
    pub facility_type: FacilityType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_other: Option<String>,

    pub size: OrganizationSize,

    #[validate(nested)]
    pub location: Location,

    #[validate(length(max = 50, message = "Too many hazards"))]
    #[serde(default)]
    pub hazards: Vec<Hazard>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hazards_other: Option<String>,

    #[serde(default)]
    pub compliance: Vec<ComplianceFramework>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure: Option<Infrastructure>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personnel: Option<Personnel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_hours: Option<OperatingHours>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_considerations: Option<String>,
}

fn validate_other_type(profile: &FacilityProfile) -> Result<(), ValidationError> {
    let missing = profile
        .type_other
        .as_deref()
        .map(|s| s.trim().is_empty())
        .unwrap_or(true);

    if profile.facility_type == FacilityType::Other && missing {
        let mut err = ValidationError::new("type_other");
        err.message = Some("Describe the facility type when selecting 'other'".into());
        return Err(err);
    }
    Ok(())
}

impl FacilityProfile {
    /// Human-readable facility type, using the free-text answer for `other`
    pub fn type_label(&self) -> String {
        match (&self.facility_type, &self.type_other) {
            (FacilityType::Other, Some(other)) if !other.trim().is_empty() => {
                other.trim().to_string()
            }
            (kind, _) => kind.label().to_string(),
        }
    }
}

/// Provenance of a section created or rewritten outside generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionMetadata {
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub added_via_chat: bool,

    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subsection {
    pub id: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub content: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsections: Vec<Subsection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SectionMetadata>,
}

impl Section {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: super::slug::slugify(&title),
            title,
            content: content.into(),
            subsections: Vec::new(),
            metadata: None,
        }
    }

    /// Content length including subsection bodies
    pub fn content_len(&self) -> usize {
        self.content.chars().count()
            + self
                .subsections
                .iter()
                .map(|s| s.content.chars().count())
                .sum::<usize>()
    }

    /// Section body followed by its subsections rendered as `###` blocks
    pub fn full_markdown(&self) -> String {
        let mut out = self.content.clone();
        for sub in &self.subsections {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str("### ");
            out.push_str(&sub.title);
            if !sub.content.is_empty() {
                out.push('\n');
                out.push_str(&sub.content);
            }
        }
        out
    }

    /// Structured blocks of the full section body
    pub fn blocks(&self) -> Vec<Block> {
        parse_blocks(&self.full_markdown())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

/// JSON document stored in `plans.content`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanContent {
    pub generated_at: DateTime<Utc>,
    pub facility_name: String,
    pub facility_type: String,
    #[serde(default)]
    pub executive_summary: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub usage: TokenUsage,
    pub facility_profile: FacilityProfile,
    #[serde(default)]
    pub confidence: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl PlanContent {
    pub fn from_json(value: &serde_json::Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn to_json(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Minimal retail profile used across engine tests
    pub fn retail_profile() -> FacilityProfile {
        serde_json::from_value(serde_json::json!({
            "name": "Corner Market",
            "type": "retail",
            "size": "1-10",
            "location": { "city": "Seattle", "state": "WA" },
            "hazards": ["fire", "active_shooter"],
            "compliance": ["osha"]
        }))
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::retail_profile;
    use super::*;

    #[test]
    fn test_minimal_profile_deserializes() {
        let profile = retail_profile();
        assert_eq!(profile.facility_type, FacilityType::Retail);
        assert_eq!(profile.size, OrganizationSize::Micro);
        assert_eq!(profile.hazards, vec![Hazard::Fire, Hazard::ActiveShooter]);
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_profile_requires_name_and_city() {
        let mut profile = retail_profile();
        profile.name.clear();
        profile.location.city.clear();

        let errors = profile.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.errors().contains_key("location"));
    }

    #[test]
    fn test_other_type_needs_description() {
        let mut profile = retail_profile();
        profile.facility_type = FacilityType::Other;
        assert!(profile.validate().is_err());

        profile.type_other = Some("Marina".into());
        assert!(profile.validate().is_ok());
        assert_eq!(profile.type_label(), "Marina");
    }

    #[test]
    fn test_full_markdown_includes_subsections() {
        let mut section = Section::new("Evacuation", "Leave calmly.");
        section.subsections.push(Subsection {
            id: "routes".into(),
            title: "Routes".into(),
            content: "Use the east stairwell.".into(),
        });

        assert_eq!(
            section.full_markdown(),
            "Leave calmly.\n\n### Routes\nUse the east stairwell."
        );
        assert_eq!(section.content_len(), 13 + 23);
    }
}
