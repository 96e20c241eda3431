//! # cliflow-core
//!
//! Core functionality for cliflow - a shell-completion engine that turns a
//! partially typed command line into ranked suggestions.
//!
//! This crate holds everything that does not touch a socket: the declarative
//! spec model, the resolver that walks it, dynamic generators and their
//! cache, the fuzzy ranker, and the wire types the daemon speaks.
//!
//! ## Architecture
//!
//! - **Specs**: [`CommandSpec`] trees loaded into a [`SpecRegistry`]
//! - **Resolution**: [`Resolver`] walks the typed tokens and gathers candidates
//! - **Generators**: [`GeneratorExecutor`] runs scripts and producers behind a
//!   shared [`GeneratorCache`]
//! - **Ranking**: [`fuzzy::rank`] orders candidates against the partial token
//! - **Protocol**: [`Request`]/[`Response`] lines exchanged with the daemon
//!
//! ## Quick Start
//!
//! ```rust
//! use cliflow_core::{CommandSpec, CompletionContext, Resolver, SpecRegistry};
//! use std::sync::Arc;
//!
//! let mut registry = SpecRegistry::new();
//! registry.register(
//!     CommandSpec::new("git")
//!         .with_subcommand(CommandSpec::new("checkout"))
//!         .with_subcommand(CommandSpec::new("commit")),
//! );
//! let resolver = Resolver::new(Arc::new(registry));
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let suggestions = rt.block_on(resolver.resolve(&CompletionContext::at_end("git chec", "/")));
//! assert_eq!(suggestions[0].name, "checkout");
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return [`Result<T, Error>`]. Resolution itself never
//! fails: broken specs and generators contribute nothing instead.

/// Configuration file and well-known paths
pub mod config;
/// Error types and result aliases
pub mod error;
/// Fuzzy matching and ranking
pub mod fuzzy;
/// Dynamic suggestion sources and their cache
pub mod generator;
/// Git repository detection and fingerprints
pub mod git;
/// Shell history frequency index
pub mod history;
/// Client/daemon wire messages
pub mod protocol;
/// Root spec lookup and search
pub mod registry;
/// Token walk and candidate assembly
pub mod resolver;
/// Declarative completion specs
pub mod spec;
/// Filesystem path suggestions
pub mod templates;
/// Command line tokenizer
pub mod tokenize;
/// Suggestions and request context
pub mod types;

// Re-export commonly used types
pub use config::{
    ClientConfig, Config, DaemonConfig, GeneratorConfig, HistoryConfig, MatchingConfig,
    SpecsConfig,
};
pub use error::{Error, Result};
pub use fuzzy::{FuzzyMatch, fuzzy_match, rank};
pub use generator::{
    CacheKey, CacheStats, ExecutorSettings, GeneratorCache, GeneratorExecutor, Producer,
};
pub use git::GitState;
pub use history::HistoryIndex;
pub use protocol::{DaemonStats, Request, RequestKind, Response};
pub use registry::SpecRegistry;
pub use resolver::Resolver;
pub use spec::{
    Argument, CachePolicy, CacheStrategy, CommandSpec, Generator, GeneratorKind, LoadSpec,
    OptionSpec, PostProcess, ScriptCommand, Template,
};
pub use types::*;
