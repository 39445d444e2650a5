//! depsync core library
//!
//! Collects automation artifacts from a source tree and deploys them to a
//! target in dependency order, either by folder depth (structural) or by
//! repeated trial deployment (adaptive).

pub mod artifact;
pub mod cancel;
pub mod client;
pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod obs;
pub mod record;
pub mod scratch;
pub mod sequencer;
pub mod source;
pub mod telemetry;

pub use artifact::{Artifact, ArtifactKind};
pub use cancel::CancelFlag;
pub use client::{CommandDeploymentClient, DeploymentClient};
pub use collector::{ArtifactCollector, Collection, RetrievalFailure, DEFAULT_EXTENSIONS};
pub use config::{DepsyncConfig, SourceConfig, SourceHandles, SourceType, TargetConfig};
pub use engine::{AdaptiveRetryDeployer, StructuralDeployer};
pub use error::{DeployError, DeployResult};
pub use graph::{DependencyGraph, DependencyGraphBuilder};
pub use record::{
    DeployMode, DeploymentRecord, DeploymentReport, DeploymentStatus, FailedArtifact, RunOutcome,
};
pub use scratch::{FsScratchStore, PathKey, ScratchStore};
pub use sequencer::{SequenceStep, TopologicalSequencer};
pub use source::{
    ArtifactFetcher, EntryType, GitHubConfig, GitHubSource, LocalSource, SourceEntry,
    SourceListing,
};

/// Crate version, also used in the HTTP user agent.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
