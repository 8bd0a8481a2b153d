//! Sync specifications: what a job asks the synchronizer to do.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{SpecError, SpecResult};

pub const PRINCIPAL_TYPE_KEY: &str = "principal_type";
pub const SYNC_TYPE_KEY: &str = "sync_type";
pub const NAMES_KEY: &str = "names";

/// Kind of directory principal a spec targets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalType {
    Users,
    Groups,
}

impl PrincipalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalType::Users => "users",
            PrincipalType::Groups => "groups",
        }
    }
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrincipalType {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("users") {
            Ok(PrincipalType::Users)
        } else if s.eq_ignore_ascii_case("groups") {
            Ok(PrincipalType::Groups)
        } else {
            Err(SpecError::InvalidPrincipalType(s.to_string()))
        }
    }
}

/// Which principals of a kind to synchronize.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    /// Every principal found in the directory.
    All,
    /// Only principals already known locally.
    Existing,
    /// Only the principals named in the spec.
    Specific,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::All => "all",
            SyncType::Existing => "existing",
            SyncType::Specific => "specific",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncType {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        [SyncType::All, SyncType::Existing, SyncType::Specific]
            .into_iter()
            .find(|t| s.eq_ignore_ascii_case(t.as_str()))
            .ok_or_else(|| SpecError::InvalidSyncType(s.to_string()))
    }
}

/// One directive within a job.
///
/// Names are only meaningful for [`SyncType::Specific`]; they are kept on
/// other modes but ignored when requests are built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSpec {
    principal_type: PrincipalType,
    sync_type: SyncType,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_names",
        deserialize_with = "deserialize_names"
    )]
    names: Vec<String>,
}

impl SyncSpec {
    pub fn new(principal_type: PrincipalType, sync_type: SyncType) -> Self {
        Self {
            principal_type,
            sync_type,
            names: Vec::new(),
        }
    }

    pub fn all(principal_type: PrincipalType) -> Self {
        Self::new(principal_type, SyncType::All)
    }

    pub fn existing(principal_type: PrincipalType) -> Self {
        Self::new(principal_type, SyncType::Existing)
    }

    pub fn specific<I, S>(principal_type: PrincipalType, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            principal_type,
            sync_type: SyncType::Specific,
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a spec from raw string properties.
    ///
    /// Keys match case-insensitively. `names` is a comma separated list;
    /// whitespace around each name is dropped, as are empty entries.
    pub fn from_properties<I, K, V>(properties: I) -> SpecResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut principal_type = None;
        let mut sync_type = None;
        let mut names = Vec::new();

        for (key, value) in properties {
            let (key, value) = (key.as_ref(), value.as_ref());
            if key.eq_ignore_ascii_case(PRINCIPAL_TYPE_KEY) {
                principal_type = Some(value.parse()?);
            } else if key.eq_ignore_ascii_case(SYNC_TYPE_KEY) {
                sync_type = Some(value.parse()?);
            } else if key.eq_ignore_ascii_case(NAMES_KEY) {
                names = split_names(value);
            } else {
                return Err(SpecError::UnknownKey(key.to_string()));
            }
        }

        match (principal_type, sync_type) {
            (Some(principal_type), Some(sync_type)) => Ok(Self {
                principal_type,
                sync_type,
                names,
            }),
            _ => Err(SpecError::MissingField),
        }
    }

    pub fn principal_type(&self) -> PrincipalType {
        self.principal_type
    }

    pub fn sync_type(&self) -> SyncType {
        self.sync_type
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Split a comma separated principal list.
pub fn split_names(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn serialize_names<S: Serializer>(names: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&names.join(","))
}

fn deserialize_names<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(split_names(&raw))
}
