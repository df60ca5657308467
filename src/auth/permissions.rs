//! Role to permission table.

use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    SubmitPrayer,
    ViewDirectory,
    LeadLifeGroup,
    ManageLifeGroups,
    ManageAnnouncements,
    ModeratePrayer,
    ManageVolunteers,
    ManageServiceRoles,
    ManageBulletins,
    ManageSermons,
    ManageTeachers,
    ManageDirectory,
    ManageUsers,
}

impl Permission {
    pub const ALL: [Permission; 13] = [
        Permission::SubmitPrayer,
        Permission::ViewDirectory,
        Permission::LeadLifeGroup,
        Permission::ManageLifeGroups,
        Permission::ManageAnnouncements,
        Permission::ModeratePrayer,
        Permission::ManageVolunteers,
        Permission::ManageServiceRoles,
        Permission::ManageBulletins,
        Permission::ManageSermons,
        Permission::ManageTeachers,
        Permission::ManageDirectory,
        Permission::ManageUsers,
    ];

    /// Phrase used in "You do not have permission to ..." messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Permission::SubmitPrayer => "submit prayer requests",
            Permission::ViewDirectory => "view the directory",
            Permission::LeadLifeGroup => "lead life groups",
            Permission::ManageLifeGroups => "manage life groups",
            Permission::ManageAnnouncements => "manage announcements",
            Permission::ModeratePrayer => "moderate prayer requests",
            Permission::ManageVolunteers => "manage volunteer opportunities",
            Permission::ManageServiceRoles => "manage service roles",
            Permission::ManageBulletins => "manage bulletins",
            Permission::ManageSermons => "manage sermons",
            Permission::ManageTeachers => "manage teaching schedules",
            Permission::ManageDirectory => "manage the directory",
            Permission::ManageUsers => "manage users",
        }
    }
}

const MEMBER: &[Permission] = &[Permission::SubmitPrayer, Permission::ViewDirectory];

const LIFE_GROUP_LEADER: &[Permission] = &[
    Permission::SubmitPrayer,
    Permission::ViewDirectory,
    Permission::LeadLifeGroup,
];

const LIFE_GROUP_ORGANIZER: &[Permission] = &[
    Permission::SubmitPrayer,
    Permission::ViewDirectory,
    Permission::LeadLifeGroup,
    Permission::ManageLifeGroups,
];

const ORGANIZER: &[Permission] = &[
    Permission::SubmitPrayer,
    Permission::ViewDirectory,
    Permission::ManageAnnouncements,
    Permission::ModeratePrayer,
    Permission::ManageVolunteers,
    Permission::ManageServiceRoles,
    Permission::ManageBulletins,
    Permission::ManageSermons,
    Permission::ManageTeachers,
];

/// Permissions granted by a role. The admin flag grants everything regardless of role.
pub fn permissions_for(role: Role, is_admin: bool) -> &'static [Permission] {
    if is_admin {
        return &Permission::ALL;
    }
    match role {
        Role::User => &[Permission::SubmitPrayer],
        Role::Member => MEMBER,
        Role::LifeGroupLeader => LIFE_GROUP_LEADER,
        Role::LifeGroupOrganizer => LIFE_GROUP_ORGANIZER,
        Role::Organizer => ORGANIZER,
        Role::Admin => &Permission::ALL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_flag_grants_everything() {
        let perms = permissions_for(Role::User, true);
        for permission in Permission::ALL {
            assert!(perms.contains(&permission));
        }
    }

    #[test]
    fn test_only_admins_manage_users_and_directory() {
        for role in [
            Role::User,
            Role::Member,
            Role::Organizer,
            Role::LifeGroupLeader,
            Role::LifeGroupOrganizer,
        ] {
            let perms = permissions_for(role, false);
            assert!(!perms.contains(&Permission::ManageUsers), "{:?}", role);
            assert!(!perms.contains(&Permission::ManageDirectory), "{:?}", role);
        }
        assert!(permissions_for(Role::Admin, false).contains(&Permission::ManageUsers));
    }

    #[test]
    fn test_leaders_lead_but_do_not_manage() {
        let perms = permissions_for(Role::LifeGroupLeader, false);
        assert!(perms.contains(&Permission::LeadLifeGroup));
        assert!(!perms.contains(&Permission::ManageLifeGroups));
        assert!(permissions_for(Role::LifeGroupOrganizer, false)
            .contains(&Permission::ManageLifeGroups));
    }

    #[test]
    fn test_plain_user_can_only_pray() {
        assert_eq!(permissions_for(Role::User, false), &[Permission::SubmitPrayer]);
    }
}
