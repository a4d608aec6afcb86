//! Block identifiers and requirement annotations
//!
//! A requirement is stored in the marker file as text:
//! `[vendor.]library.name(code-code@vX.Y.Z)` where each code records how a
//! unit of the required block was consumed and the trailing version is the
//! release the consumer was built against.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::version::{PartialVersion, Version};
use crate::PackageError;

/// Vendor / library / name triple. Vendor may be empty.
///
/// Equality is exact; use [`Identifier::key`] for case-insensitive lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Identifier {
    pub vendor: String,
    pub library: String,
    pub name: String,
}

impl Identifier {
    pub fn new(
        vendor: impl Into<String>,
        library: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            library: library.into(),
            name: name.into(),
        }
    }

    /// Lowercased copy used as a lookup key.
    pub fn key(&self) -> Identifier {
        Identifier {
            vendor: self.vendor.to_lowercase(),
            library: self.library.to_lowercase(),
            name: self.name.to_lowercase(),
        }
    }

    /// Case-insensitive comparison.
    pub fn same_block(&self, other: &Identifier) -> bool {
        self.key() == other.key()
    }

    /// Title with the version chain, e.g. `arith.adder(latest-v1@v1.2.0)`.
    pub fn full_title(&self, version: &Version, codes: &[UsageCode]) -> String {
        let mut chain = String::new();
        for code in codes {
            chain.push_str(&code.to_string());
            chain.push('-');
        }
        format!("{}({}@{})", self, chain, version)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.vendor.is_empty() {
            write!(f, "{}.{}", self.library, self.name)
        } else {
            write!(f, "{}.{}.{}", self.vendor, self.library, self.name)
        }
    }
}

impl FromStr for Identifier {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        let id = match parts.as_slice() {
            [library, name] => Identifier::new("", *library, *name),
            [vendor, library, name] => Identifier::new(*vendor, *library, *name),
            _ => return Err(PackageError::InvalidIdentifier(s.to_string())),
        };
        if id.library.is_empty() || id.name.is_empty() {
            return Err(PackageError::InvalidIdentifier(s.to_string()));
        }
        Ok(id)
    }
}

/// How a requirement was consumed by its dependent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UsageCode {
    /// Through the installed "latest" copy.
    Latest,
    /// Through a working copy; never allowed in a release.
    Unstable,
    /// Through a cache pin (`v1`, `v1.2`, `v1.2.3`).
    Pinned(PartialVersion),
}

impl fmt::Display for UsageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageCode::Latest => write!(f, "latest"),
            UsageCode::Unstable => write!(f, "unstable"),
            UsageCode::Pinned(pin) => write!(f, "{}", pin),
        }
    }
}

impl FromStr for UsageCode {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latest" => Ok(UsageCode::Latest),
            "unstable" => Ok(UsageCode::Unstable),
            other => PartialVersion::parse(other)
                .map(UsageCode::Pinned)
                .ok_or_else(|| PackageError::InvalidRequirement(s.to_string())),
        }
    }
}

/// One entry of a block's `requires` list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Requirement {
    pub id: Identifier,
    /// Release of the required block the codes resolved to.
    pub version: Version,
    /// Sorted and deduplicated.
    pub codes: Vec<UsageCode>,
}

impl Requirement {
    pub fn new(id: Identifier, version: Version, mut codes: Vec<UsageCode>) -> Self {
        codes.sort();
        codes.dedup();
        Self { id, version, codes }
    }

    pub fn is_unstable(&self) -> bool {
        self.codes.contains(&UsageCode::Unstable)
    }

    pub fn uses_latest(&self) -> bool {
        self.codes.contains(&UsageCode::Latest)
    }

    /// Graph vertex of the required block at the consumed version.
    pub fn node(&self) -> BlockNode {
        BlockNode::new(&self.id, self.version)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<String> = self.codes.iter().map(|c| c.to_string()).collect();
        write!(f, "{}({}@{})", self.id, codes.join("-"), self.version)
    }
}

impl FromStr for Requirement {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PackageError::InvalidRequirement(s.to_string());

        let open = s.find('(').ok_or_else(invalid)?;
        let close = s.rfind(')').ok_or_else(invalid)?;
        if close < open {
            return Err(invalid());
        }

        let id: Identifier = s[..open].parse()?;
        let inner = &s[open + 1..close];
        let at = inner.rfind('@').ok_or_else(invalid)?;

        let version = Version::parse_release(&inner[at + 1..]).map_err(|_| invalid())?;
        let codes = inner[..at]
            .split('-')
            .filter(|c| !c.trim().is_empty())
            .map(UsageCode::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Requirement::new(id, version, codes))
    }
}

impl TryFrom<String> for Requirement {
    type Error = PackageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Requirement> for String {
    fn from(value: Requirement) -> Self {
        value.to_string()
    }
}

/// Vertex of the block-level dependency graph: a block key at a version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockNode {
    pub key: Identifier,
    pub version: Version,
}

impl BlockNode {
    pub fn new(id: &Identifier, version: Version) -> Self {
        Self {
            key: id.key(),
            version,
        }
    }
}

impl fmt::Display for BlockNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(@{})", self.key, self.version)
    }
}
