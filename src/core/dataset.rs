//! Dataset tiers and distribution flags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Priority tier of a content source.
///
/// Ordering is significant: a higher tier wins when the same asset is
/// declared by more than one source.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Dataset {
    Cyan,
    #[default]
    Base,
    Contrib,
    Override,
}

impl Dataset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Cyan => "cyan",
            Dataset::Base => "base",
            Dataset::Contrib => "contrib",
            Dataset::Override => "override",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cyan" => Ok(Dataset::Cyan),
            "base" => Ok(Dataset::Base),
            "contrib" => Ok(Dataset::Contrib),
            "override" => Ok(Dataset::Override),
            _ => Err(format!(
                "invalid dataset '{}'; expected 'cyan', 'base', 'contrib', or 'override'",
                s
            )),
        }
    }
}

impl TryFrom<String> for Dataset {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Whether an asset is distributed to clients.
///
/// Manifests written by hand often spell this as a YAML boolean, so both
/// booleans and the string names are accepted when reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Distribute {
    False,
    #[default]
    True,
    /// Distribute even when the client would otherwise skip it.
    Always,
}

impl Distribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distribute::False => "false",
            Distribute::True => "true",
            Distribute::Always => "always",
        }
    }
}

impl fmt::Display for Distribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Distribute {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Distribute {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DistributeVisitor;

        impl serde::de::Visitor<'_> for DistributeVisitor {
            type Value = Distribute;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a boolean or one of 'false', 'true', 'always'")
            }

            fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<Distribute, E> {
                Ok(if v { Distribute::True } else { Distribute::False })
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Distribute, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(DistributeVisitor)
    }
}

impl FromStr for Distribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "false" => Ok(Distribute::False),
            "true" => Ok(Distribute::True),
            "always" => Ok(Distribute::Always),
            _ => Err(format!(
                "invalid distribute value '{}'; expected 'false', 'true', or 'always'",
                s
            )),
        }
    }
}
