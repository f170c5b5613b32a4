//! Demo directory data

use chrono::Utc;

use super::memory::InMemoryDirectoryStore;
use super::types::{DirectoryRecord, Group, Membership, INCLUDE_FLAG};
use crate::rules::RuleType;

#[allow(clippy::too_many_arguments)]
fn user(
    id: &str,
    display_name: &str,
    department: &str,
    location: &str,
    role: &str,
    employment_type: &str,
    tags: &[&str],
    directory_groups: &[&str],
    manager: &str,
    tenure_days: i64,
) -> DirectoryRecord {
    let email = format!("{}@demo.local", display_name.to_lowercase().replace(' ', "."));
    DirectoryRecord {
        id: id.to_string(),
        display_name: display_name.to_string(),
        email: Some(email),
        employment_type: Some(employment_type.to_string()),
        location: Some(location.to_string()),
        role: Some(role.to_string()),
        department: Some(department.to_string()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        directory_groups: directory_groups.iter().map(|g| g.to_string()).collect(),
        manager: Some(manager.to_string()),
        tenure_days: Some(tenure_days),
        org_unit: None,
        active: Some(true),
    }
}

pub fn demo_users() -> Vec<DirectoryRecord> {
    vec![
        user(
            "u_alex",
            "Alex Rivera",
            "Permian Operations",
            "Permian Field Office",
            "Operations Manager",
            "Full-time",
            &["Operations", "Leadership"],
            &["DL_Permian_Operators", "DL_Leadership"],
            "Casey Lee",
            820,
        ),
        user(
            "u_jane",
            "Jane Doe",
            "Permian Operations",
            "Midland Regional HQ",
            "Production Engineer",
            "Full-time",
            &["Operations", "Responder"],
            &["DL_Permian_Engineers", "DL_Permian_Operators"],
            "Alex Rivera",
            420,
        ),
        user(
            "u_temp",
            "Sam Contractor",
            "East Projects",
            "Permian Field Office",
            "Contract Technician",
            "Contractor",
            &["Operations"],
            &["DL_Permian_Engineers"],
            "Alex Rivera",
            18,
        ),
        user(
            "u_casey",
            "Casey Lee",
            "Corporate IT",
            "Houston HQ",
            "IT Systems Analyst",
            "Full-time",
            &["Leadership", "AI"],
            &["DL_Corporate_IT", "DL_Data_Analytics"],
            "Maria Gonzales",
            960,
        ),
        user(
            "u_maria",
            "Maria Gonzales",
            "HSE",
            "Houston HQ",
            "HSE Specialist",
            "Full-time",
            &["HSE", "Responder"],
            &["DL_HSE_Responders"],
            "Casey Lee",
            640,
        ),
        user(
            "u_devon",
            "Devon Price",
            "Permian Operations",
            "Permian Field Office",
            "Pipeline Coordinator",
            "Full-time",
            &["Operations"],
            &["DL_Permian_Operators"],
            "Alex Rivera",
            210,
        ),
        user(
            "u_erika",
            "Erika Howard",
            "South Operations",
            "Remote",
            "Drilling Supervisor",
            "Full-time",
            &["Operations", "Leadership"],
            &["DL_Permian_Operators"],
            "Maria Gonzales",
            510,
        ),
        user(
            "u_frank",
            "Frank Patel",
            "Analytics Guild",
            "Houston HQ",
            "Data Scientist",
            "Full-time",
            &["Analytics", "AI"],
            &["DL_Data_Analytics", "DL_Corporate_IT"],
            "Casey Lee",
            120,
        ),
    ]
}

pub fn demo_groups() -> Vec<Group> {
    [
        ("g_acl_evin_north", "ACL_EVIN-North", "North", "EVIN access for North asset team"),
        ("g_msg_prod_east", "MSG_Production_East", "East", "Production messaging channel for East region"),
        ("g_drill_permian", "DRILL_Permian", "Permian", "Drilling supervisors in the Permian"),
        ("g_hse_incident", "HSE_Incident_Response", "HSE", "Rapid responders for HSE incidents"),
        ("g_corp_it", "Corporate_IT", "Corporate", "Corporate IT administrators"),
    ]
    .into_iter()
    .map(|(id, name, business_unit, description)| Group {
        id: id.to_string(),
        name: name.to_string(),
        business_unit: business_unit.to_string(),
        description: description.to_string(),
    })
    .collect()
}

pub fn demo_memberships() -> Vec<Membership> {
    let now = Utc::now();
    [
        ("m1", "u_temp", "g_msg_prod_east", RuleType::User, "Sam Contractor"),
        ("m2", "u_jane", "g_acl_evin_north", RuleType::User, "Jane Doe"),
        ("m3", "u_alex", "g_drill_permian", RuleType::Tree, "Permian Operations"),
    ]
    .into_iter()
    .map(|(id, user_id, group_id, rule_type, rule_value)| Membership {
        id: id.to_string(),
        user_id: user_id.to_string(),
        group_id: group_id.to_string(),
        rule_type,
        rule_value: Some(rule_value.to_string()),
        added_at: now,
        updated_at: now,
        flag: INCLUDE_FLAG.to_string(),
    })
    .collect()
}

impl InMemoryDirectoryStore {
    /// Store seeded with the demo users, groups and memberships
    pub fn demo() -> Self {
        Self::new(demo_users(), demo_groups(), demo_memberships())
    }
}
