//! Enumeration types for the secondary location assigner
//!
//! Activity purposes and travel modes arrive as survey codes. Anchor purposes
//! (home, work, education) get dedicated variants because the chain decomposer
//! branches on them; every other purpose and every mode is kept as its code.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Survey code of the home purpose
pub const HOME_CODE: &str = "1";
/// Survey code of the work purpose
pub const WORK_CODE: &str = "4";
/// Survey code of the education purpose
pub const EDUCATION_CODE: &str = "5";

/// Purpose of the activity at the end (or start) of a trip
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ActivityPurpose {
    /// Home anchor
    Home,
    /// Work anchor
    Work,
    /// Education anchor
    Education,
    /// Any non-anchor purpose (shopping, leisure, errands, ...), keyed by its code
    Secondary(String),
}

impl ActivityPurpose {
    /// Whether this purpose has a location fixed by the primary-location stage
    pub fn is_anchor(&self) -> bool {
        !matches!(self, ActivityPurpose::Secondary(_))
    }

    /// Survey code of this purpose
    pub fn code(&self) -> &str {
        match self {
            ActivityPurpose::Home => HOME_CODE,
            ActivityPurpose::Work => WORK_CODE,
            ActivityPurpose::Education => EDUCATION_CODE,
            ActivityPurpose::Secondary(code) => code,
        }
    }
}

impl fmt::Display for ActivityPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityPurpose::Home => write!(f, "Home"),
            ActivityPurpose::Work => write!(f, "Work"),
            ActivityPurpose::Education => write!(f, "Education"),
            ActivityPurpose::Secondary(code) => write!(f, "Secondary({})", code),
        }
    }
}

impl FromStr for ActivityPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("Activity purpose code must not be empty".to_string());
        }

        match trimmed.to_lowercase().as_str() {
            HOME_CODE | "home" => Ok(ActivityPurpose::Home),
            WORK_CODE | "work" => Ok(ActivityPurpose::Work),
            EDUCATION_CODE | "education" => Ok(ActivityPurpose::Education),
            _ => Ok(ActivityPurpose::Secondary(trimmed.to_string())),
        }
    }
}

impl TryFrom<String> for ActivityPurpose {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ActivityPurpose> for String {
    fn from(purpose: ActivityPurpose) -> Self {
        purpose.code().to_string()
    }
}

/// Main travel mode of a trip, keyed by its survey code
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TravelMode(pub String);

impl TravelMode {
    /// Create a travel mode from its code
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Survey code of this mode
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TravelMode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Which attempt the orchestrator keeps when no attempt converges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GiveUpPolicy {
    /// Keep the attempt of the final iteration
    #[default]
    Last,
    /// Keep the attempt with the smallest threshold excess
    Best,
}

impl fmt::Display for GiveUpPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GiveUpPolicy::Last => write!(f, "last"),
            GiveUpPolicy::Best => write!(f, "best"),
        }
    }
}

impl FromStr for GiveUpPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "last" => Ok(GiveUpPolicy::Last),
            "best" => Ok(GiveUpPolicy::Best),
            _ => Err(format!("Unknown give-up policy: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_parsing_from_codes() {
        assert_eq!("1".parse::<ActivityPurpose>().unwrap(), ActivityPurpose::Home);
        assert_eq!("4".parse::<ActivityPurpose>().unwrap(), ActivityPurpose::Work);
        assert_eq!("5".parse::<ActivityPurpose>().unwrap(), ActivityPurpose::Education);
        assert_eq!(
            "7".parse::<ActivityPurpose>().unwrap(),
            ActivityPurpose::Secondary("7".to_string())
        );
        assert!("".parse::<ActivityPurpose>().is_err());
    }

    #[test]
    fn test_purpose_parsing_from_names() {
        assert_eq!("Home".parse::<ActivityPurpose>().unwrap(), ActivityPurpose::Home);
        assert_eq!("WORK".parse::<ActivityPurpose>().unwrap(), ActivityPurpose::Work);
        assert_eq!("education".parse::<ActivityPurpose>().unwrap(), ActivityPurpose::Education);
    }

    #[test]
    fn test_anchor_classification() {
        assert!(ActivityPurpose::Home.is_anchor());
        assert!(ActivityPurpose::Work.is_anchor());
        assert!(ActivityPurpose::Education.is_anchor());
        assert!(!ActivityPurpose::Secondary("9".to_string()).is_anchor());
    }

    #[test]
    fn test_purpose_serializes_as_code() {
        let json = serde_json::to_string(&ActivityPurpose::Work).unwrap();
        assert_eq!(json, "\"4\"");

        let shopping: ActivityPurpose = serde_json::from_str("\"6\"").unwrap();
        assert_eq!(shopping, ActivityPurpose::Secondary("6".to_string()));
        assert_eq!(serde_json::to_string(&shopping).unwrap(), "\"6\"");
    }

    #[test]
    fn test_give_up_policy_parsing() {
        assert_eq!("last".parse::<GiveUpPolicy>().unwrap(), GiveUpPolicy::Last);
        assert_eq!("BEST".parse::<GiveUpPolicy>().unwrap(), GiveUpPolicy::Best);
        assert!("first".parse::<GiveUpPolicy>().is_err());
        assert_eq!(GiveUpPolicy::default(), GiveUpPolicy::Last);
        assert_eq!(serde_json::to_string(&GiveUpPolicy::Best).unwrap(), "\"best\"");
    }
}
