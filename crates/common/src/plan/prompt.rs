//! Prompt builder for plan generation
//!
//! The system prompt carries role, compliance and formatting rules; the user
//! prompt carries the facility template and profile facts.

use super::model::{ComplianceFramework, FacilityProfile, FacilityType};
use std::fmt::Write;

/// Sections every generated plan must contain, in order
pub const REQUIRED_SECTIONS: [&str; 10] = [
    "Executive Summary",
    "Purpose and Scope",
    "Emergency Contacts",
    "Chain of Command",
    "Hazard-Specific Response Procedures",
    "Evacuation Procedures",
    "Shelter-in-Place Procedures",
    "Communication Plan",
    "Training and Drills",
    "Plan Maintenance and Review",
];

impl ComplianceFramework {
    pub fn label(&self) -> &'static str {
        match self {
            ComplianceFramework::Osha => "OSHA",
            ComplianceFramework::Nfpa => "NFPA",
            ComplianceFramework::Fema => "FEMA",
            ComplianceFramework::Hipaa => "HIPAA",
            ComplianceFramework::JointCommission => "The Joint Commission",
            ComplianceFramework::Iso22301 => "ISO 22301",
        }
    }

    /// Requirements the plan must address for this framework
    pub fn requirements(&self) -> &'static str {
        match self {
            ComplianceFramework::Osha => {
                "OSHA 29 CFR 1910.38: written emergency action plan covering procedures for \
                 reporting emergencies, evacuation type and exit route assignments, procedures \
                 for employees who remain to operate critical operations, accounting for all \
                 employees after evacuation, rescue and medical duties, and names or job titles \
                 of people to contact. Include an employee alarm system and training requirements."
            }
            ComplianceFramework::Nfpa => {
                "NFPA 101 Life Safety Code and NFPA 1600: means of egress, fire drills at the \
                 required frequency, fire alarm and suppression system descriptions, and a \
                 continuity and emergency management program with hazard assessment."
            }
            ComplianceFramework::Fema => {
                "FEMA CPG 101 and NIMS/ICS: align roles with the Incident Command System, use \
                 plain language, cover all hazards identified in the risk assessment, and \
                 describe coordination with local emergency management."
            }
            ComplianceFramework::Hipaa => {
                "HIPAA Security Rule 45 CFR 164.308(a)(7): contingency plan with data backup, \
                 disaster recovery and emergency mode operation procedures that protect \
                 electronic protected health information."
            }
            ComplianceFramework::JointCommission => {
                "Joint Commission EM standards: hazard vulnerability analysis, communications, \
                 resources and assets, safety and security, staff responsibilities, utilities \
                 management and patient clinical support activities during emergencies."
            }
            ComplianceFramework::Iso22301 => {
                "ISO 22301 business continuity: business impact analysis, recovery time \
                 objectives, continuity strategies, exercise and testing program, and \
                 management review of the plan."
            }
        }
    }
}

fn facility_focus(facility_type: FacilityType) -> &'static str {
    match facility_type {
        FacilityType::Office => {
            "multi-floor evacuation, stairwell use, visitor accounting, IT and data \
             continuity, and remote-work fallback"
        }
        FacilityType::Retail => {
            "customer evacuation, cash handling and register securing, robbery and armed \
             intruder response, crowd management and stockroom hazards"
        }
        FacilityType::Healthcare => {
            "patient evacuation and shelter-in-place, medical gas and oxygen hazards, \
             infection control, surge capacity and continuity of critical care"
        }
        FacilityType::Manufacturing => {
            "machine shutdown and lockout, hazardous materials, spill response, \
             confined spaces and industrial fire suppression"
        }
        FacilityType::Warehouse => {
            "forklift and racking hazards, large-area evacuation, loading dock \
             safety, stored hazardous goods and roof collapse"
        }
        FacilityType::Education => {
            "student accountability, lockdown procedures, parent reunification, \
             special-needs students and bus evacuation"
        }
        FacilityType::Restaurant => {
            "kitchen fires and hood suppression, gas shutoff, food safety during outages, \
             guest evacuation and burns or choking first aid"
        }
        FacilityType::Hospitality => {
            "guest notification and evacuation across floors, overnight staffing, \
             guests with disabilities, pool and kitchen hazards"
        }
        FacilityType::Other => {
            "the specific operations described in the profile, occupant safety and \
             continuity of essential functions"
        }
    }
}

/// System prompt for plan generation
pub fn build_system_prompt(profile: &FacilityProfile) -> String {
    let mut prompt = String::from(
        "You are an expert emergency management consultant who writes emergency response \
         plans (ERPs) for organizations. Plans must be specific to the facility, actionable \
         by untrained staff, and written in clear, plain language.\n",
    );

    if !profile.compliance.is_empty() {
        prompt.push_str("\nCOMPLIANCE REQUIREMENTS\nThe plan must satisfy:\n");
        for framework in &profile.compliance {
            let _ = writeln!(prompt, "- {}: {}", framework.label(), framework.requirements());
        }
    }

    prompt.push_str(
        "\nACCESSIBILITY\n\
         - Include procedures for people with mobility, vision, hearing and cognitive \
         disabilities, including evacuation assistance and buddy assignments.\n\
         - Use short sentences and numbered steps for every procedure.\n",
    );

    let languages: Vec<&str> = profile
        .personnel
        .as_ref()
        .map(|p| {
            p.languages
                .iter()
                .map(String::as_str)
                .filter(|l| !l.trim().is_empty())
                .collect()
        })
        .unwrap_or_default();
    if !languages.is_empty() {
        let _ = writeln!(
            prompt,
            "\nMULTILINGUAL REQUIREMENTS\nStaff and occupants speak: {}. Note where signage, \
             alerts and training materials must be provided in each language.",
            languages.join(", ")
        );
    }

    prompt.push_str(
        "\nFORMATTING RULES\n\
         - Use `## ` headings for each top-level section and `### ` headings for subsections.\n\
         - Present contact information as markdown tables with columns Role | Name | Phone.\n\
         - Use numbered lists for step-by-step procedures and bullet lists for checklists.\n\
         - Do not wrap the plan in code fences and do not add commentary before or after it.\n",
    );

    prompt
}

/// User prompt for plan generation
pub fn build_user_prompt(profile: &FacilityProfile) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "Create a comprehensive emergency response plan for a {} facility. Focus on {}.\n",
        profile.type_label().to_lowercase(),
        facility_focus(profile.facility_type)
    );

    prompt.push_str("FACILITY PROFILE\n");
    let _ = writeln!(prompt, "- Name: {}", profile.name);
    let _ = writeln!(prompt, "- Type: {}", profile.type_label());
    let _ = writeln!(prompt, "- Size: {}", profile.size.label());

    let location = &profile.location;
    let mut place = format!("{}, {}", location.city, location.state);
    if let Some(zip) = location.zip.as_deref().filter(|z| !z.is_empty()) {
        place.push(' ');
        place.push_str(zip);
    }
    let _ = writeln!(prompt, "- Location: {}", place);
    if let Some(address) = location.address.as_deref().filter(|a| !a.is_empty()) {
        let _ = writeln!(prompt, "- Address: {}", address);
    }

    if let Some(infra) = &profile.infrastructure {
        if let Some(floors) = infra.floors {
            let _ = writeln!(prompt, "- Floors: {}", floors);
        }
        if let Some(sqft) = infra.square_footage {
            let _ = writeln!(prompt, "- Square footage: {}", sqft);
        }
        if let Some(exits) = infra.exits {
            let _ = writeln!(prompt, "- Exits: {}", exits);
        }
        if let Some(sprinklers) = infra.has_sprinklers {
            let _ = writeln!(prompt, "- Sprinkler system: {}", yes_no(sprinklers));
        }
        if let Some(generator) = infra.has_generator {
            let _ = writeln!(prompt, "- Backup generator: {}", yes_no(generator));
        }
        if !infra.assembly_points.is_empty() {
            let _ = writeln!(prompt, "- Assembly points: {}", infra.assembly_points.join("; "));
        }
    }

    if let Some(personnel) = &profile.personnel {
        if let Some(employees) = personnel.employees {
            let _ = writeln!(prompt, "- Employees: {}", employees);
        }
        if let Some(visitors) = personnel.daily_visitors {
            let _ = writeln!(prompt, "- Daily visitors: {}", visitors);
        }
        if personnel.mobility_impaired_occupants == Some(true) {
            prompt.push_str("- Occupants include people with limited mobility\n");
        }
    }

    if let Some(hours) = &profile.operating_hours {
        if hours.always_open {
            prompt.push_str("- Operating hours: open 24/7\n");
        } else {
            if let Some(weekdays) = hours.weekdays.as_deref() {
                let _ = writeln!(prompt, "- Weekday hours: {}", weekdays);
            }
            if let Some(weekends) = hours.weekends.as_deref() {
                let _ = writeln!(prompt, "- Weekend hours: {}", weekends);
            }
        }
    }

    prompt.push_str("\nHAZARDS TO ADDRESS\n");
    if profile.hazards.is_empty() && profile.hazards_other.is_none() {
        prompt.push_str("- Fire\n- Medical emergency\n- Severe weather\n");
    }
    for hazard in &profile.hazards {
        let _ = writeln!(prompt, "- {}", hazard.label());
    }
    if let Some(other) = profile.hazards_other.as_deref().filter(|o| !o.trim().is_empty()) {
        let _ = writeln!(prompt, "- {}", other.trim());
    }

    if let Some(special) = profile
        .special_considerations
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        let _ = writeln!(prompt, "\nSPECIAL CONSIDERATIONS\n{}", special.trim());
    }

    prompt.push_str("\nREQUIRED SECTIONS (use these exact `## ` headings, in this order)\n");
    for (i, title) in REQUIRED_SECTIONS.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, title);
    }
    prompt.push_str(
        "\nUnder Hazard-Specific Response Procedures add one `### ` subsection per hazard \
         listed above with before, during and after steps.",
    );

    prompt
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
