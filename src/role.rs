//! Closed role enumeration and the scope each role carries.
//!
//! Identity directories hand out role names as free-form labels. They are
//! parsed once into [`Role`], and every visibility or authority decision goes
//! through [`Role::scope`] rather than comparing label strings.
use super::error::ParseError;
use std::fmt;
use std::str::FromStr;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    #[n(0)]
    User,
    #[n(1)]
    Member,
    #[n(2)]
    Moderator,
    #[n(3)]
    Monitor,
    #[n(4)]
    UpazilaCoordinator,
    #[n(5)]
    UpazilaSubCoordinator,
    #[n(6)]
    DistrictCoordinator,
    #[n(7)]
    DistrictSubCoordinator,
    #[n(8)]
    DistrictItMedia,
    #[n(9)]
    DivisionalCoordinator,
    #[n(10)]
    DivisionalSubCoordinator,
    #[n(11)]
    Executive,
    #[n(12)]
    HeadOfItMedia,
    #[n(13)]
    Admin,
}

/// How far a role can see and act across the geo hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// Own requests, plus pending requests nearby the user could donate to.
    Own,
    /// Home upazila.
    Team,
    /// Home district.
    District,
    /// Every district under the home division.
    Division,
    Global,
}

impl Role {
    pub const ALL: [Role; 14] = [
        Role::User,
        Role::Member,
        Role::Moderator,
        Role::Monitor,
        Role::UpazilaCoordinator,
        Role::UpazilaSubCoordinator,
        Role::DistrictCoordinator,
        Role::DistrictSubCoordinator,
        Role::DistrictItMedia,
        Role::DivisionalCoordinator,
        Role::DivisionalSubCoordinator,
        Role::Executive,
        Role::HeadOfItMedia,
        Role::Admin,
    ];

    pub fn scope(&self) -> Scope {
        match self {
            Role::User | Role::Member => Scope::Own,
            Role::Moderator
            | Role::Monitor
            | Role::UpazilaCoordinator
            | Role::UpazilaSubCoordinator => Scope::Team,
            Role::DistrictCoordinator | Role::DistrictSubCoordinator | Role::DistrictItMedia => {
                Scope::District
            }
            Role::DivisionalCoordinator | Role::DivisionalSubCoordinator => Scope::Division,
            Role::Executive | Role::HeadOfItMedia | Role::Admin => Scope::Global,
        }
    }

    pub fn is_coordinator(&self) -> bool {
        self.scope() != Scope::Own
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Member => "Member",
            Role::Moderator => "Moderator",
            Role::Monitor => "Monitor",
            Role::UpazilaCoordinator => "Upazila Coordinator",
            Role::UpazilaSubCoordinator => "Upazila Sub-Coordinator",
            Role::DistrictCoordinator => "District Coordinator",
            Role::DistrictSubCoordinator => "District Sub-Coordinator",
            Role::DistrictItMedia => "District IT & Media",
            Role::DivisionalCoordinator => "Divisional Coordinator",
            Role::DivisionalSubCoordinator => "Divisional Sub-Coordinator",
            Role::Executive => "Executive",
            Role::HeadOfItMedia => "Head of IT & Media",
            Role::Admin => "Admin",
        }
    }

    /// Roles whose scope is exactly `scope`.
    pub fn with_scope(scope: Scope) -> impl Iterator<Item = Role> {
        Role::ALL.into_iter().filter(move |role| role.scope() == scope)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// labels arrive with inconsistent case, spacing and hyphenation
fn normalise(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '&')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalise(s);
        Role::ALL
            .into_iter()
            .find(|role| normalise(role.label()) == wanted)
            .ok_or_else(|| ParseError::new("role", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_form_labels_parse() {
        assert_eq!("district coordinator".parse::<Role>().unwrap(), Role::DistrictCoordinator);
        assert_eq!("Upazila Sub Coordinator".parse::<Role>().unwrap(), Role::UpazilaSubCoordinator);
        assert_eq!("HEAD OF IT & MEDIA".parse::<Role>().unwrap(), Role::HeadOfItMedia);
        assert!("Treasurer".parse::<Role>().is_err());
    }

    #[test]
    fn every_scope_has_a_role() {
        for scope in [Scope::Own, Scope::Team, Scope::District, Scope::Division, Scope::Global] {
            assert!(Role::with_scope(scope).next().is_some());
        }
    }
}
