use super::{FieldType, ObjectType, Schema};
use crate::core::Result;

const USER_FIELDS: &[&str] = &[
    "createdAt",
    "updatedAt",
    "firstName",
    "lastName",
    "fullName",
    "email",
    "phone",
    "photoUrl",
    "websiteUrl",
    "twitterHandle",
    "instagramHandle",
    "bio",
];

pub(super) fn build() -> Result<Schema> {
    Schema::new()
        .with_type(
            ObjectType::keyed("User")
                .scalars(USER_FIELDS)
                .field("memberships", FieldType::list("Membership")),
        )?
        .with_type(
            ObjectType::keyed("MemberRole").scalars(&["createdAt", "updatedAt", "name", "description"]),
        )?
        .with_type(
            ObjectType::keyed("Membership")
                .scalars(&["createdAt", "updatedAt", "start", "end"])
                .field("user", FieldType::object("User"))
                .field("role", FieldType::object("MemberRole")),
        )?
        .with_type(ObjectType::embedded("BuildInfo").scalars(&["timestamp", "version"]))?
        .with_root_field("viewer", FieldType::object("User"))?
        .with_root_field("users", FieldType::list("User"))?
        .with_root_field("memberRoles", FieldType::list("MemberRole"))?
        .with_root_field("buildInfo", FieldType::object("BuildInfo"))?
        .with_node_lookup()?
        // payloads
        .with_type(
            ObjectType::embedded("RegisterUserPayload")
                .field("user", FieldType::object("User"))
                .scalar("isNewUser"),
        )?
        .with_type(ObjectType::embedded("UpdateUserPayload").field("user", FieldType::object("User")))?
        .with_type(
            ObjectType::embedded("CreateMemberRolePayload").field("role", FieldType::object("MemberRole")),
        )?
        .with_type(
            ObjectType::embedded("UpdateMemberRolePayload").field("role", FieldType::object("MemberRole")),
        )?
        .with_type(ObjectType::embedded("DeleteMemberRolePayload").scalar("roleId"))?
        .with_type(
            ObjectType::embedded("CreateMembershipPayload")
                .field("membership", FieldType::object("Membership")),
        )?
        .with_type(
            ObjectType::embedded("UpdateMembershipPayload")
                .field("membership", FieldType::object("Membership")),
        )?
        .with_type(ObjectType::embedded("DeleteMembershipPayload").scalar("membershipId"))?
        .with_mutation("registerUser", "RegisterUserInput", "RegisterUserPayload")?
        .with_mutation("updateUser", "UpdateUserInput", "UpdateUserPayload")?
        .with_mutation("createMemberRole", "CreateMemberRoleInput", "CreateMemberRolePayload")?
        .with_mutation("updateMemberRole", "UpdateMemberRoleInput", "UpdateMemberRolePayload")?
        .with_mutation("deleteMemberRole", "DeleteMemberRoleInput", "DeleteMemberRolePayload")?
        .with_mutation("createMembership", "CreateMembershipInput", "CreateMembershipPayload")?
        .with_mutation("updateMembership", "UpdateMembershipInput", "UpdateMembershipPayload")?
        .with_mutation("deleteMembership", "DeleteMembershipInput", "DeleteMembershipPayload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ROOT_KIND;

    #[test]
    fn test_lattice_schema_builds() {
        let schema = build().unwrap();
        assert!(schema.object("User").unwrap().is_keyed());
        assert!(!schema.object("BuildInfo").unwrap().is_keyed());
        assert_eq!(
            schema.field_type("Membership", "role").unwrap(),
            &FieldType::object("MemberRole")
        );
        assert_eq!(
            schema.field_type(ROOT_KIND, "viewer").unwrap(),
            &FieldType::object("User")
        );
        assert!(schema.has_node_lookup());
        assert!(schema.readable_field(ROOT_KIND, "node").is_err());
        assert_eq!(
            schema.mutation("createMemberRole").unwrap().input_type,
            "CreateMemberRoleInput"
        );
    }
}
