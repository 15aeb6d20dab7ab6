//! Permission checks.
//!
//! All checks are plain set membership against a [`PermissionSet`] that the
//! caller already holds; nothing here touches the store. Handlers pass the set
//! captured in the [`RequestContext`](crate::auth::current_user::RequestContext)
//! when the request started, so a concurrent permission change never alters a
//! decision already in flight.

use crate::{
    errors::Error,
    types::{Permission, PermissionSet},
};

/// True if `tag` names a known permission held in `permissions`. Unknown tags are never granted.
pub fn has_permission(permissions: &PermissionSet, tag: &str) -> bool {
    tag.parse::<Permission>().is_ok_and(|p| permissions.contains(p))
}

/// True if every tag is a known permission held in `permissions`.
pub fn has_all_permissions<I, S>(permissions: &PermissionSet, tags: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter().all(|tag| has_permission(permissions, tag.as_ref()))
}

/// Fail with [`Error::Forbidden`] unless `permission` is held.
pub fn require_permission(permissions: &PermissionSet, permission: Permission) -> Result<(), Error> {
    if permissions.contains(permission) {
        Ok(())
    } else {
        Err(Error::Forbidden { permission })
    }
}

/// Fail with [`Error::Forbidden`] naming the first missing permission.
pub fn require_all_permissions(permissions: &PermissionSet, required: &[Permission]) -> Result<(), Error> {
    required.iter().try_for_each(|p| require_permission(permissions, *p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> PermissionSet {
        [Permission::CourseEdit, Permission::CourseView].into_iter().collect()
    }

    #[test]
    fn test_has_permission() {
        let permissions = editor();
        assert!(has_permission(&permissions, "course.edit"));
        assert!(!has_permission(&permissions, "course.delete"));
    }

    #[test]
    fn test_unknown_tags_never_grant() {
        let permissions = PermissionSet::all();
        assert!(!has_permission(&permissions, "course.superuser"));
        assert!(!has_permission(&permissions, ""));
        assert!(!has_permission(&permissions, "Course.Edit"));
        assert!(!has_all_permissions(&permissions, ["course.edit", "made.up"]));
    }

    #[test]
    fn test_has_all_permissions() {
        let permissions = editor();
        assert!(has_all_permissions(&permissions, ["course.edit", "course.view"]));
        assert!(!has_all_permissions(&permissions, ["course.edit", "user.view"]));
        assert!(has_all_permissions(&permissions, Vec::<String>::new()));
    }

    #[test]
    fn test_require_permission() {
        let permissions = editor();
        assert!(require_permission(&permissions, Permission::CourseEdit).is_ok());

        let err = require_permission(&permissions, Permission::UserDelete).unwrap_err();
        assert!(matches!(
            err,
            Error::Forbidden {
                permission: Permission::UserDelete
            }
        ));
    }

    #[test]
    fn test_require_all_permissions_reports_first_missing() {
        let permissions = editor();
        let err = require_all_permissions(&permissions, &[Permission::CourseView, Permission::LessonEdit, Permission::UserView])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Forbidden {
                permission: Permission::LessonEdit
            }
        ));
        assert!(require_all_permissions(&PermissionSet::empty(), &[]).is_ok());
    }
}
