use std::{collections::HashSet, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// Enumerated capabilities of the application, one per gated write operation.
/// Stored in the database as comma separated names (see [`Permission::as_str`]).
#[derive(Debug, Hash, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    AddFilm,
    ChangeFilm,
    DeleteFilm,
    AddGenre,
    ChangeGenre,
    DeleteGenre,
    AddAttachment,
    DeleteAttachment,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::AddFilm => "add_film",
            Permission::ChangeFilm => "change_film",
            Permission::DeleteFilm => "delete_film",
            Permission::AddGenre => "add_genre",
            Permission::ChangeGenre => "change_genre",
            Permission::DeleteGenre => "delete_genre",
            Permission::AddAttachment => "add_attachment",
            Permission::DeleteAttachment => "delete_attachment",
        }
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown permission: {0}")]
pub struct UnknownPermission(String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add_film" => Ok(Permission::AddFilm),
            "change_film" => Ok(Permission::ChangeFilm),
            "delete_film" => Ok(Permission::DeleteFilm),
            "add_genre" => Ok(Permission::AddGenre),
            "change_genre" => Ok(Permission::ChangeGenre),
            "delete_genre" => Ok(Permission::DeleteGenre),
            "add_attachment" => Ok(Permission::AddAttachment),
            "delete_attachment" => Ok(Permission::DeleteAttachment),
            other => Err(UnknownPermission(other.to_string())),
        }
    }
}

/// Capability check interface - business logic depends on this abstractly,
/// so the auth subsystem can be swapped without touching it.
pub trait Authorization {
    fn is_superuser(&self) -> bool;

    fn has_permission(&self, permission: Permission) -> bool;

    fn has_any_permission<I>(&self, permissions: I) -> bool
    where
        I: IntoIterator<Item = Permission>,
    {
        permissions.into_iter().any(|p| self.has_permission(p))
    }
}

/// Authenticated user as kept in the session.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserClaim {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub superuser: bool,
    pub permissions: HashSet<Permission>,
}

impl Authorization for UserClaim {
    fn is_superuser(&self) -> bool {
        self.superuser
    }

    // superuser holds every permission implicitly
    fn has_permission(&self, permission: Permission) -> bool {
        self.superuser || self.permissions.contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_roundtrip() {
        for p in [
            Permission::AddFilm,
            Permission::ChangeFilm,
            Permission::DeleteFilm,
            Permission::AddGenre,
            Permission::ChangeGenre,
            Permission::DeleteGenre,
            Permission::AddAttachment,
            Permission::DeleteAttachment,
        ] {
            assert_eq!(p.as_str().parse::<Permission>().unwrap(), p);
        }
        assert!("movies.add_film".parse::<Permission>().is_err());
    }

    #[test]
    fn test_claim_permissions() {
        let claim = UserClaim {
            id: 1,
            username: "hilda".to_string(),
            email: "hilda@example.com".to_string(),
            superuser: false,
            permissions: HashSet::from([Permission::AddFilm, Permission::ChangeFilm]),
        };
        assert!(claim.has_permission(Permission::AddFilm));
        assert!(!claim.has_permission(Permission::DeleteFilm));
        assert!(claim.has_any_permission([Permission::DeleteFilm, Permission::ChangeFilm]));
        assert!(!claim.is_superuser());
    }

    #[test]
    fn test_superuser_has_all() {
        let claim = UserClaim {
            id: 2,
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            superuser: true,
            permissions: HashSet::new(),
        };
        assert!(claim.has_permission(Permission::DeleteFilm));
        assert!(claim.is_superuser());
    }
}
