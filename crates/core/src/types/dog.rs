//! Dog profile types.
//!
//! The field names on the wire match the documents stored in the hosted
//! `dogs` collection: `name`, `description`, `photoURL`, `birthDate`,
//! `breed`, `gender`, `ownerId`.

use core::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::id::{DogId, UserUid};

/// Gender of a dog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DogGender {
    Male,
    Female,
}

impl DogGender {
    /// Lowercase wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    /// The ♂ / ♀ symbol shown on profile cards.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Male => "♂",
            Self::Female => "♀",
        }
    }
}

impl fmt::Display for DogGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`DogGender`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("gender must be \"male\" or \"female\", got {0:?}")]
pub struct ParseGenderError(pub String);

impl FromStr for DogGender {
    type Err = ParseGenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            other => Err(ParseGenderError(other.to_owned())),
        }
    }
}

/// A stored birth date.
///
/// Accepts `2024-01-04` and RFC 3339 datetimes (Firestore timestamps), taking
/// the calendar date in the value's own offset. Anything else is kept as the
/// raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BirthDate {
    Date(NaiveDate),
    Unparsed(String),
}

impl BirthDate {
    /// Interpret a stored value.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
            .map_or_else(|| Self::Unparsed(raw.to_owned()), Self::Date)
    }

    /// The calendar date, if the value was one.
    #[must_use]
    pub const fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(date) => Some(*date),
            Self::Unparsed(_) => None,
        }
    }
}

impl From<NaiveDate> for BirthDate {
    fn from(date: NaiveDate) -> Self {
        Self::Date(date)
    }
}

/// Dates display as `YYYY-MM-DD`; unparsed values as stored.
impl fmt::Display for BirthDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Unparsed(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for BirthDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BirthDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// A dog profile record without its identifier, as written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDogProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<BirthDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<DogGender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserUid>,
}

impl NewDogProfile {
    /// A record with only the required name set.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            photo_url: None,
            birth_date: None,
            breed: None,
            gender: None,
            owner_id: None,
        }
    }

    /// Set the owner.
    #[must_use]
    pub fn owned_by(mut self, owner: impl Into<UserUid>) -> Self {
        self.owner_id = Some(owner.into());
        self
    }

    /// Attach the store-assigned identifier.
    #[must_use]
    pub fn with_id(self, id: DogId) -> DogProfile {
        DogProfile {
            id,
            name: self.name,
            description: self.description,
            photo_url: self.photo_url,
            birth_date: self.birth_date,
            breed: self.breed,
            gender: self.gender,
            owner_id: self.owner_id,
        }
    }
}

/// A stored dog profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DogProfile {
    /// Assigned by the document store at creation; never changes.
    pub id: DogId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<BirthDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<DogGender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserUid>,
}

impl DogProfile {
    /// The record without its identifier.
    #[must_use]
    pub fn record(&self) -> NewDogProfile {
        NewDogProfile {
            name: self.name.clone(),
            description: self.description.clone(),
            photo_url: self.photo_url.clone(),
            birth_date: self.birth_date.clone(),
            breed: self.breed.clone(),
            gender: self.gender,
            owner_id: self.owner_id.clone(),
        }
    }

    /// Whether `uid` owns this dog.
    #[must_use]
    pub fn is_owned_by(&self, uid: &UserUid) -> bool {
        self.owner_id.as_ref() == Some(uid)
    }
}
