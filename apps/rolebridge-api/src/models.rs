//! SCIM User and Group request and response documents.

use serde::{Deserialize, Serialize};

use rolebridge_core::{Employee, GroupKey, Member, MemberSet};

/// SCIM User name component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimName {
    #[serde(default)]
    pub given_name: String,

    #[serde(default)]
    pub family_name: String,
}

impl ScimName {
    /// Split a stored full name at the first whitespace run.
    #[must_use]
    pub fn from_full_name(full: &str) -> Self {
        let mut parts = full.split_whitespace();
        Self {
            given_name: parts.next().unwrap_or_default().to_string(),
            family_name: parts.collect::<Vec<_>>().join(" "),
        }
    }

    /// Given and family name joined by a space, skipping empty parts.
    #[must_use]
    pub fn full_name(&self) -> String {
        [self.given_name.as_str(), self.family_name.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// SCIM Email value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimEmail {
    pub value: String,

    /// Email type (e.g. "work").
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub email_type: Option<String>,

    #[serde(default)]
    pub primary: bool,
}

fn default_active() -> bool {
    true
}

/// User body of POST and PUT /scim/v2/Users.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUserRequest {
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Okta user id; required on create.
    #[serde(default)]
    pub external_id: Option<String>,

    /// Login name, stored as the employee email.
    pub user_name: String,

    #[serde(default)]
    pub name: ScimName,

    #[serde(default)]
    pub emails: Vec<ScimEmail>,

    #[serde(default = "default_active")]
    pub active: bool,
}

impl ScimUserRequest {
    /// The primary email, else the first one, else `userName`.
    #[must_use]
    pub fn email(&self) -> &str {
        self.emails
            .iter()
            .find(|e| e.primary)
            .or_else(|| self.emails.first())
            .map_or(self.user_name.as_str(), |e| e.value.as_str())
    }
}

/// SCIM User resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUser {
    pub schemas: Vec<String>,

    /// Okta user id.
    pub id: String,

    pub user_name: String,

    pub name: ScimName,

    pub active: bool,

    pub emails: Vec<ScimEmail>,
}

impl ScimUser {
    /// SCIM Core User schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:schemas:core:2.0:User";
}

impl From<&Employee> for ScimUser {
    fn from(employee: &Employee) -> Self {
        Self {
            schemas: vec![Self::SCHEMA.to_string()],
            id: employee.id.to_string(),
            user_name: employee.email.clone(),
            name: ScimName::from_full_name(&employee.name),
            active: employee.active,
            emails: vec![ScimEmail {
                value: employee.email.clone(),
                email_type: Some("work".to_string()),
                primary: true,
            }],
        }
    }
}

/// SCIM List Response (RFC 7644 Section 3.4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimListResponse<T> {
    pub schemas: Vec<String>,

    pub total_results: u32,

    /// 1-based index of the first result in this page.
    pub start_index: u32,

    pub items_per_page: u32,

    #[serde(rename = "Resources")]
    pub resources: Vec<T>,
}

impl<T> ScimListResponse<T> {
    /// SCIM List Response schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:api:messages:2.0:ListResponse";

    /// A page of resources. `totalResults` counts the resources returned.
    #[must_use]
    pub fn new(resources: Vec<T>, start_index: u32) -> Self {
        let count = u32::try_from(resources.len()).unwrap_or(u32::MAX);
        Self {
            schemas: vec![Self::SCHEMA.to_string()],
            total_results: count,
            start_index,
            items_per_page: count,
            resources,
        }
    }
}

/// SCIM Group member reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroupMember {
    /// Member profile ID.
    pub value: String,

    /// Member display name (usually the email).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl From<ScimGroupMember> for Member {
    fn from(member: ScimGroupMember) -> Self {
        Member::new(member.value, member.display.unwrap_or_default())
    }
}

/// Desired state for a group (PUT or PATCH body).
///
/// `members` is the complete desired membership; an empty or missing list
/// empties the group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroupRequest {
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Group name, used as the group key.
    pub display_name: String,

    #[serde(default)]
    pub members: Vec<ScimGroupMember>,
}

/// SCIM Group resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroup {
    pub schemas: Vec<String>,

    /// Okta group id bound to the group; empty while unbound.
    pub id: String,

    pub display_name: String,

    /// Members, sorted by value.
    #[serde(default)]
    pub members: Vec<ScimGroupMember>,
}

impl ScimGroup {
    /// SCIM Core Group schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:schemas:core:2.0:Group";

    #[must_use]
    pub fn from_members(id: impl Into<String>, group: &GroupKey, members: &MemberSet) -> Self {
        let mut members: Vec<ScimGroupMember> = members
            .iter()
            .map(|m| ScimGroupMember {
                value: m.id.to_string(),
                display: Some(m.display.clone()).filter(|d| !d.is_empty()),
            })
            .collect();
        members.sort_by(|a, b| a.value.cmp(&b.value));

        Self {
            schemas: vec![Self::SCHEMA.to_string()],
            id: id.into(),
            display_name: group.to_string(),
            members,
        }
    }
}
