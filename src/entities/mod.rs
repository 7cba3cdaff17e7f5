//! Typed records of the membership API and its mutations.

mod mutations;

pub use mutations::{
    CreateMemberRole, CreateMemberRoleInput, CreateMemberRolePayload, CreateMembership,
    CreateMembershipInput, CreateMembershipPayload, DeleteMemberRole, DeleteMemberRoleInput,
    DeleteMemberRolePayload, DeleteMembership, DeleteMembershipInput, DeleteMembershipPayload,
    RegisterUser, RegisterUserInput, RegisterUserPayload, UpdateMemberRole, UpdateMemberRoleInput,
    UpdateMemberRolePayload, UpdateMembership, UpdateMembershipInput, UpdateMembershipPayload,
    UpdateUser, UpdateUserInput, UpdateUserPayload,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::Identity;
use crate::plan::FieldPlan;

pub const USER: &str = "User";
pub const MEMBER_ROLE: &str = "MemberRole";
pub const MEMBERSHIP: &str = "Membership";

/// Link to an entity when only its id was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub website_url: Option<String>,
    pub twitter_handle: Option<String>,
    pub instagram_handle: Option<String>,
    pub bio: Option<String>,
}

impl User {
    pub fn identity(id: &str) -> Identity {
        Identity::new(USER, id)
    }

    /// Fields shown on a profile card.
    pub fn profile_plan() -> FieldPlan {
        FieldPlan::new()
            .field("id")
            .field("fullName")
            .field("email")
            .field("phone")
            .field("photoUrl")
            .field("websiteUrl")
            .field("twitterHandle")
            .field("instagramHandle")
            .field("bio")
    }

    /// Fields edited by the profile form.
    pub fn socials_plan() -> FieldPlan {
        FieldPlan::new()
            .field("id")
            .field("websiteUrl")
            .field("twitterHandle")
            .field("instagramHandle")
            .field("bio")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRole {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl MemberRole {
    pub fn identity(id: &str) -> Identity {
        Identity::new(MEMBER_ROLE, id)
    }

    pub fn plan() -> FieldPlan {
        FieldPlan::new().field("id").field("name").field("description")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: String,
    pub user: Option<EntityRef>,
    pub role: Option<EntityRef>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Membership {
    pub fn identity(id: &str) -> Identity {
        Identity::new(MEMBERSHIP, id)
    }

    pub fn plan() -> FieldPlan {
        FieldPlan::new()
            .field("id")
            .field(["user", "id"])
            .field(["role", "id"])
            .field("start")
            .field("end")
    }
}
