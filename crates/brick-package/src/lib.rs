//! Brickyard block engine
//!
//! Versioning, dependency graphs, the multi-level installation cache and
//! the release workflow for reusable HDL blocks. Version control, prompts
//! and HDL lexing are reached through the collaborator traits in [`vcs`],
//! [`prompt`] and [`unit`].

pub mod block;
pub mod cache;
pub mod export;
pub mod graph;
pub mod install;
pub mod level;
pub mod metadata;
pub mod prompt;
pub mod registry;
pub mod release;
pub mod requirement;
pub mod unit;
pub mod vcs;
pub mod version;
pub mod workspace;

use std::path::PathBuf;

pub use block::BlockRecord;
pub use cache::CacheLayout;
pub use export::Recipe;
pub use graph::{DependencyGraph, GraphError, TopoOrder};
pub use install::{InstallOutcome, PinOutcome, UninstallOutcome};
pub use level::{BlockRef, Level, LevelSlots};
pub use metadata::{BlockMetadata, BlockSection, MARKER};
pub use prompt::{AutoConfirm, Decline, Prompter};
pub use registry::{BlockRegistry, InventoryRow};
pub use release::{ReleaseOptions, ReleaseReport};
pub use requirement::{BlockNode, Identifier, Requirement, UsageCode};
pub use unit::{HdlUnit, Language, SurfaceLexer, UnitKind, UnitLexer, UnitRef};
pub use vcs::{Repository, Vcs};
pub use version::{Bump, NextVersion, PartialVersion, Version};
pub use workspace::{EngineSettings, Workspace};

/// Block engine errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    // validation
    #[error("Invalid version '{0}'")]
    InvalidVersion(String),

    #[error("Invalid block identifier '{0}'; expected [vendor.]library.name")]
    InvalidIdentifier(String),

    #[error("Invalid requirement '{0}'")]
    InvalidRequirement(String),

    #[error("Cannot have empty metadata key: {0}")]
    EmptyField(String),

    // corruption
    #[error("Block {title} version {version} is corrupted: {reason}")]
    Corrupt {
        title: String,
        version: String,
        reason: String,
    },

    #[error("No {marker} found under {path}", marker = metadata::MARKER)]
    MissingMarker { path: PathBuf },

    // conflict
    #[error("Block {title} already occupies the {level} level")]
    LevelOccupied { title: String, level: Level },

    #[error("Specified version {requested} is not higher than latest version {highest}")]
    VersionNotIncreasing { requested: Version, highest: Version },

    #[error("Block {0} requires unstable blocks; release every required block first")]
    UnstableRequirement(String),

    #[error("Block title '{query}' is ambiguous; candidates: {}", candidates.join(", "))]
    AmbiguousBlock {
        query: String,
        candidates: Vec<String>,
    },

    // environment
    #[error("No write permission for the remote repository of {0}")]
    WritePermission(String),

    #[error("Remote repository of {0} is unreachable")]
    RemoteUnreachable(String),

    #[error("Repository of {0} is not up-to-date with its remote")]
    OutOfSync(String),

    #[error("Cannot access block's repository for {0}")]
    RepositoryUnavailable(String),

    #[error("Block {0} has no repository attached")]
    NoRepository(String),

    #[error("Block {0} cannot be installed because it has no release points")]
    NoReleases(String),

    #[error("Block {0} is not installed to the cache")]
    NotInstalled(String),

    #[error("Version {version} does not exist for {title}")]
    UnknownVersion { title: String, version: String },

    #[error("Version {version} may not exist or be installed to the cache for {title}")]
    VersionNotInstalled { title: String, version: String },

    #[error("Block {0} not found")]
    BlockNotFound(String),

    #[error("Unit {unit} does not exist within block {title}")]
    UnitNotFound { title: String, unit: String },

    #[error("Version control failed during {operation}: {message}")]
    Vcs { operation: String, message: String },

    // resource
    #[error("Path already exists: {0}")]
    PathExists(PathBuf),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize metadata: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl PackageError {
    /// Wrap an IO error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PackageError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn vcs(operation: impl Into<String>, message: impl Into<String>) -> Self {
        PackageError::Vcs {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PackageError>;
