//! Common type definitions and the permission enumeration.
//!
//! This module defines:
//! - Type aliases for entity IDs (UserId, SubmissionId, ...)
//! - [`Permission`]: the closed set of capability tags a user can hold
//! - [`PermissionSet`]: the set of permissions attached to a user record
//!
//! # Permission tags
//!
//! Every permission has a stable string form of the shape `<entity>.<action>`
//! (e.g. `course.edit`, `user.delete`) plus the cross-cutting
//! `submission.solve`. The string form is what is persisted on the user record
//! and what the admin API accepts.
//!
//! Tags read back from storage that are not part of the enumeration are
//! dropped, so a typo in stored data can never grant anything. Tags arriving
//! through the API are validated strictly with [`PermissionSet::try_from_tags`].
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type SubmissionId = Uuid;
pub type ExerciseId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

macro_rules! permissions {
    ($($variant:ident => $tag:literal),+ $(,)?) => {
        /// A single capability tag.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Permission {
            $(
                #[serde(rename = $tag)]
                $variant,
            )+
        }

        impl Permission {
            /// Every permission, in declaration order.
            pub const ALL: &'static [Permission] = &[$(Permission::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Permission::$variant => $tag,)+
                }
            }
        }

        impl FromStr for Permission {
            type Err = UnknownPermission;

            fn from_str(tag: &str) -> Result<Self, Self::Err> {
                match tag {
                    $($tag => Ok(Permission::$variant),)+
                    other => Err(UnknownPermission(other.to_string())),
                }
            }
        }
    };
}

permissions! {
    ExerciseCreate => "exercise.create",
    ExerciseEdit => "exercise.edit",
    ExerciseDelete => "exercise.delete",
    ExerciseView => "exercise.view",
    LessonCreate => "lesson.create",
    LessonEdit => "lesson.edit",
    LessonDelete => "lesson.delete",
    LessonView => "lesson.view",
    ChapterCreate => "chapter.create",
    ChapterEdit => "chapter.edit",
    ChapterDelete => "chapter.delete",
    ChapterView => "chapter.view",
    CourseCreate => "course.create",
    CourseEdit => "course.edit",
    CourseDelete => "course.delete",
    CourseView => "course.view",
    UserCreate => "user.create",
    UserEdit => "user.edit",
    UserDelete => "user.delete",
    UserView => "user.view",
    SubmissionSolve => "submission.solve",
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a tag is not part of the permission enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission tag '{0}'")]
pub struct UnknownPermission(pub String);

/// The permissions held by one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A set holding every known permission (used for the initial administrator).
    pub fn all() -> Self {
        Self(Permission::ALL.iter().copied().collect())
    }

    /// Build a set from stored tags, silently dropping anything outside the enumeration.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(tags.into_iter().filter_map(|tag| tag.as_ref().parse().ok()).collect())
    }

    /// Build a set from untrusted input, failing on the first unknown tag.
    pub fn try_from_tags<I, S>(tags: I) -> Result<Self, UnknownPermission>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .map(|tag| tag.as_ref().parse::<Permission>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    /// Stored representation: the tag strings in a stable order.
    pub fn to_tags(&self) -> Vec<String> {
        self.0.iter().map(|p| p.as_str().to_string()).collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
