//! User profile record.

use serde::{Deserialize, Serialize};

/// Activity counters shown on a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCounters {
    pub followers: u32,
    pub following: u32,
    pub posts: u32,
}

/// Denormalized user-facing record keyed by subject identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub subject: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub counters: ProfileCounters,
}

impl Profile {
    /// Create a bare profile.
    pub fn new(subject: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            display_name: display_name.into(),
            avatar_url: None,
            bio: None,
            counters: ProfileCounters::default(),
        }
    }

    /// Set bio.
    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }

    /// Set avatar reference.
    pub fn with_avatar(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parsing_defaults() {
        let json = r#"{"subject": "user-1", "display_name": "Ada"}"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile, Profile::new("user-1", "Ada"));
        assert_eq!(profile.counters.followers, 0);
    }
}
