// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::Date;

use crate::ids::PlanMacroId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMacro {
    pub id: PlanMacroId,
    pub name: String,
    pub begin: Date,
    pub end: Date,
    pub description: String,
    pub documented: bool,
    pub archived: bool,
}

/// Flags controlling what the backend copies into the new plan. Content
/// flags are only honored when their parent keep flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicationOptions {
    pub keep_plan_level: bool,
    pub keep_plan_content: bool,
    pub keep_doc_section: bool,
    pub keep_doc_content: bool,
}

impl DuplicationOptions {
    /// Builds the options sent with a duplicate request. Document flags are
    /// forced off for plans without a document; the section flag mirrors the
    /// `documented` flag (document customization is not user-editable yet).
    pub fn for_plan(
        documented: bool,
        keep_levels: bool,
        keep_level_content: bool,
        keep_section_content: bool,
    ) -> Self {
        Self {
            keep_plan_level: keep_levels,
            keep_plan_content: keep_levels && keep_level_content,
            keep_doc_section: documented,
            keep_doc_content: documented && keep_section_content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRequest {
    pub plan: PlanMacro,
    pub options: DuplicationOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListScope {
    All,
    Archived,
    Unarchived,
}

impl ListScope {
    pub const ALL: [Self; 3] = [Self::All, Self::Archived, Self::Unarchived];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Archived => "archived",
            Self::Unarchived => "unarchived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    ManagePlanMacro,
}

impl Permission {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ManagePlanMacro => "MANAGE_PLAN_MACRO",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "MANAGE_PLAN_MACRO" => Some(Self::ManagePlanMacro),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionContext {
    pub manager: bool,
    pub permissions: Vec<Permission>,
}

impl SessionContext {
    pub fn can_manage_plan_macros(&self) -> bool {
        self.manager || self.permissions.contains(&Permission::ManagePlanMacro)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabKind {
    Dashboard,
    Plans,
}

impl TabKind {
    pub const ALL: [Self; 2] = [Self::Dashboard, Self::Plans];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Plans => "plans",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DuplicationOptions, Permission, SessionContext};

    #[test]
    fn content_flags_require_parent_keep_flags() {
        let options = DuplicationOptions::for_plan(true, false, true, true);
        assert!(!options.keep_plan_level);
        assert!(!options.keep_plan_content);
        assert!(options.keep_doc_section);
        assert!(options.keep_doc_content);
    }

    #[test]
    fn document_flags_forced_off_for_undocumented_plan() {
        let options = DuplicationOptions::for_plan(false, true, true, true);
        assert!(options.keep_plan_level);
        assert!(options.keep_plan_content);
        assert!(!options.keep_doc_section);
        assert!(!options.keep_doc_content);
    }

    #[test]
    fn manager_role_grants_plan_management() {
        let session = SessionContext {
            manager: true,
            permissions: Vec::new(),
        };
        assert!(session.can_manage_plan_macros());
    }

    #[test]
    fn explicit_permission_grants_plan_management() {
        let session = SessionContext {
            manager: false,
            permissions: vec![Permission::ManagePlanMacro],
        };
        assert!(session.can_manage_plan_macros());
    }

    #[test]
    fn empty_session_is_denied() {
        assert!(!SessionContext::default().can_manage_plan_macros());
    }

    #[test]
    fn permission_parse_round_trips() {
        let permission = Permission::ManagePlanMacro;
        assert_eq!(Permission::parse(permission.as_str()), Some(permission));
        assert_eq!(Permission::parse("UNKNOWN"), None);
    }
}
