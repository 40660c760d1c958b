use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum length of a family id in bytes.
pub const MAX_FAMILY_ID_LEN: usize = 128;

/// Rejected family identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid family id '{id}': {reason}")]
pub struct InvalidFamilyId {
    pub id: String,
    pub reason: &'static str,
}

/// Opaque family identifier.
///
/// Ids name physical database files, so they are restricted to ASCII
/// letters, digits, `-`, `_` and `.` (never `.` or `..` alone). Ids are
/// validated, never rewritten: two distinct ids always stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FamilyId(String);

impl FamilyId {
    /// # Errors
    /// Returns [`InvalidFamilyId`] if `id` is empty, too long, `.`/`..`, or
    /// contains a character outside `[A-Za-z0-9._-]`.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidFamilyId> {
        let id = id.into();
        let reason = if id.is_empty() {
            Some("must not be empty")
        } else if id.len() > MAX_FAMILY_ID_LEN {
            Some("longer than 128 bytes")
        } else if id == "." || id == ".." {
            Some("reserved path component")
        } else if !id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        {
            Some("only ASCII letters, digits, '-', '_' and '.' are allowed")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(InvalidFamilyId { id, reason }),
            None => Ok(Self(id)),
        }
    }

    /// Fresh random id (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FamilyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for FamilyId {
    type Err = InvalidFamilyId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for FamilyId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// A tenant: one isolated set of financial data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub id: FamilyId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyRole {
    Owner,
    Member,
}

impl FamilyRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Member => "member",
        }
    }
}

impl FromStr for FamilyRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "member" => Ok(Self::Member),
            other => Err(format!("unknown family role '{other}'")),
        }
    }
}

/// Links a signed-in identity (email) to a family and a member inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFamilyMapping {
    pub id: String,
    pub email: String,
    pub family_id: FamilyId,
    pub family_role: FamilyRole,
    pub member_id: String,
    pub last_active_at: DateTime<Utc>,
    pub is_local_only: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => Err(format!("unknown theme '{other}'")),
        }
    }
}

/// Cached currency conversion rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    pub from: String,
    pub to: String,
    pub rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ExchangeRate {
    fn pair(&self) -> (&str, &str) {
        (&self.from, &self.to)
    }
}

/// Cross-family preferences. Exactly one record exists per installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    pub theme: Theme,
    pub language: String,
    pub last_active_family_id: Option<FamilyId>,
    pub exchange_rates: Vec<ExchangeRate>,
    pub exchange_rate_auto_update: bool,
    pub exchange_rate_last_fetch: Option<DateTime<Utc>>,
}

impl GlobalSettings {
    /// Settings used before anything was ever saved.
    #[must_use]
    pub fn defaults(language: impl Into<String>) -> Self {
        Self {
            theme: Theme::System,
            language: language.into(),
            last_active_family_id: None,
            exchange_rates: Vec::new(),
            exchange_rate_auto_update: true,
            exchange_rate_last_fetch: None,
        }
    }

    /// Overlay every field present in `patch`.
    pub fn apply(&mut self, patch: GlobalSettingsPatch) {
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(language) = patch.language {
            self.language = language;
        }
        if let Some(last_active) = patch.last_active_family_id {
            self.last_active_family_id = last_active;
        }
        if let Some(rates) = patch.exchange_rates {
            self.exchange_rates = rates;
        }
        if let Some(auto_update) = patch.exchange_rate_auto_update {
            self.exchange_rate_auto_update = auto_update;
        }
        if let Some(last_fetch) = patch.exchange_rate_last_fetch {
            self.exchange_rate_last_fetch = last_fetch;
        }
    }

    /// Merge `rates` into the cached list keyed by `(from, to)`.
    ///
    /// A rate for a known pair replaces the old one in place; unknown pairs
    /// are appended in the order given.
    pub fn merge_exchange_rates(&mut self, rates: impl IntoIterator<Item = ExchangeRate>) {
        for rate in rates {
            match self
                .exchange_rates
                .iter_mut()
                .find(|existing| existing.pair() == rate.pair())
            {
                Some(existing) => *existing = rate,
                None => self.exchange_rates.push(rate),
            }
        }
    }
}

/// Partial update for [`GlobalSettings`].
///
/// `None` leaves a field untouched. Nullable fields take `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalSettingsPatch {
    pub theme: Option<Theme>,
    pub language: Option<String>,
    pub last_active_family_id: Option<Option<FamilyId>>,
    pub exchange_rates: Option<Vec<ExchangeRate>>,
    pub exchange_rate_auto_update: Option<bool>,
    pub exchange_rate_last_fetch: Option<Option<DateTime<Utc>>>,
}
