use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::{EntityRef, MemberRole, Membership, User};
use crate::core::{Identity, Result};
use crate::mutation::{MutationAction, MutationDescriptor, MutationSpec};
use crate::plan::FieldPlan;

fn input<T: Serialize>(args: &T) -> Result<Json> {
    Ok(serde_json::to_value(args)?)
}

// registerUser

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserInput {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserPayload {
    pub user: EntityRef,
    pub is_new_user: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterUser;

impl MutationSpec for RegisterUser {
    type Args = RegisterUserInput;
    type Payload = RegisterUserPayload;

    fn action(&self) -> MutationAction {
        MutationAction::Create
    }

    fn subject(&self) -> &str {
        "user"
    }

    fn describe(&self, args: &RegisterUserInput) -> Result<MutationDescriptor> {
        Ok(MutationDescriptor::new(
            "registerUser",
            input(args)?,
            FieldPlan::new().field("user.id").field("isNewUser"),
        ))
    }
}

// updateUser

/// `None` clears the field on the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInput {
    pub user_id: String,
    pub website_url: Option<String>,
    pub twitter_handle: Option<String>,
    pub instagram_handle: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateUserPayload {
    pub user: User,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateUser;

impl MutationSpec for UpdateUser {
    type Args = UpdateUserInput;
    type Payload = UpdateUserPayload;

    fn action(&self) -> MutationAction {
        MutationAction::Update
    }

    fn subject(&self) -> &str {
        "profile"
    }

    fn describe(&self, args: &UpdateUserInput) -> Result<MutationDescriptor> {
        Ok(MutationDescriptor::new(
            "updateUser",
            input(args)?,
            FieldPlan::new().nested("user", &User::socials_plan()),
        ))
    }
}

// member roles

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMemberRoleInput {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRoleInput {
    pub role_id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMemberRoleInput {
    pub role_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateMemberRolePayload {
    pub role: MemberRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateMemberRolePayload {
    pub role: MemberRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMemberRolePayload {
    pub role_id: String,
}

const MEMBER_ROLE_SUBJECT: &str = "member role";

#[derive(Debug, Clone, Copy, Default)]
pub struct CreateMemberRole;

impl MutationSpec for CreateMemberRole {
    type Args = CreateMemberRoleInput;
    type Payload = CreateMemberRolePayload;

    fn action(&self) -> MutationAction {
        MutationAction::Create
    }

    fn subject(&self) -> &str {
        MEMBER_ROLE_SUBJECT
    }

    fn describe(&self, args: &CreateMemberRoleInput) -> Result<MutationDescriptor> {
        Ok(MutationDescriptor::new(
            "createMemberRole",
            input(args)?,
            FieldPlan::new().nested("role", &MemberRole::plan()),
        ))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateMemberRole;

impl MutationSpec for UpdateMemberRole {
    type Args = UpdateMemberRoleInput;
    type Payload = UpdateMemberRolePayload;

    fn action(&self) -> MutationAction {
        MutationAction::Update
    }

    fn subject(&self) -> &str {
        MEMBER_ROLE_SUBJECT
    }

    fn describe(&self, args: &UpdateMemberRoleInput) -> Result<MutationDescriptor> {
        Ok(MutationDescriptor::new(
            "updateMemberRole",
            input(args)?,
            FieldPlan::new().nested("role", &MemberRole::plan()),
        ))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteMemberRole;

impl MutationSpec for DeleteMemberRole {
    type Args = DeleteMemberRoleInput;
    type Payload = DeleteMemberRolePayload;

    fn action(&self) -> MutationAction {
        MutationAction::Delete
    }

    fn subject(&self) -> &str {
        MEMBER_ROLE_SUBJECT
    }

    fn describe(&self, args: &DeleteMemberRoleInput) -> Result<MutationDescriptor> {
        Ok(MutationDescriptor::new(
            "deleteMemberRole",
            input(args)?,
            FieldPlan::new().field("roleId"),
        ))
    }

    fn removes(&self, _args: &DeleteMemberRoleInput, payload: &DeleteMemberRolePayload) -> Option<Identity> {
        Some(MemberRole::identity(&payload.role_id))
    }
}

// memberships

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMembershipInput {
    pub user_id: String,
    pub role_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMembershipInput {
    pub membership_id: String,
    pub role_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMembershipInput {
    pub membership_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateMembershipPayload {
    pub membership: Membership,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateMembershipPayload {
    pub membership: Membership,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMembershipPayload {
    pub membership_id: String,
}

const MEMBERSHIP_SUBJECT: &str = "membership";

#[derive(Debug, Clone, Copy, Default)]
pub struct CreateMembership;

impl MutationSpec for CreateMembership {
    type Args = CreateMembershipInput;
    type Payload = CreateMembershipPayload;

    fn action(&self) -> MutationAction {
        MutationAction::Create
    }

    fn subject(&self) -> &str {
        MEMBERSHIP_SUBJECT
    }

    fn describe(&self, args: &CreateMembershipInput) -> Result<MutationDescriptor> {
        Ok(MutationDescriptor::new(
            "createMembership",
            input(args)?,
            FieldPlan::new().nested("membership", &Membership::plan()),
        ))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateMembership;

impl MutationSpec for UpdateMembership {
    type Args = UpdateMembershipInput;
    type Payload = UpdateMembershipPayload;

    fn action(&self) -> MutationAction {
        MutationAction::Update
    }

    fn subject(&self) -> &str {
        MEMBERSHIP_SUBJECT
    }

    fn describe(&self, args: &UpdateMembershipInput) -> Result<MutationDescriptor> {
        Ok(MutationDescriptor::new(
            "updateMembership",
            input(args)?,
            FieldPlan::new().nested("membership", &Membership::plan()),
        ))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteMembership;

impl MutationSpec for DeleteMembership {
    type Args = DeleteMembershipInput;
    type Payload = DeleteMembershipPayload;

    fn action(&self) -> MutationAction {
        MutationAction::Delete
    }

    fn subject(&self) -> &str {
        MEMBERSHIP_SUBJECT
    }

    fn describe(&self, args: &DeleteMembershipInput) -> Result<MutationDescriptor> {
        Ok(MutationDescriptor::new(
            "deleteMembership",
            input(args)?,
            FieldPlan::new().field("membershipId"),
        ))
    }

    fn removes(&self, _args: &DeleteMembershipInput, payload: &DeleteMembershipPayload) -> Option<Identity> {
        Some(Membership::identity(&payload.membership_id))
    }
}
