//! Declarative completion specs.
//!
//! A spec is a tree of [`CommandSpec`] nodes read from JSON with camelCase
//! keys. Several fields accept either a single value or an array (`name`,
//! `args`, `template`, `generators`, `generateSpec`), matching how hand-written
//! spec files tend to look:
//!
//! ```json
//! {
//!   "name": "git",
//!   "subcommands": [
//!     {
//!       "name": ["checkout", "co"],
//!       "options": [{ "name": ["-b"], "args": { "name": "branch" } }],
//!       "args": {
//!         "name": "branch",
//!         "generators": {
//!           "script": "git branch --format='%(refname:short)'",
//!           "cache": { "strategy": "git-status-change" }
//!         }
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! List fields (`subcommands`, `options`, `args`, `suggestions`,
//! `generators`...) are read entry by entry: an entry that does not parse is
//! logged and dropped, and its siblings survive.
//!
//! Specs are immutable once loaded; the resolver layers lazily loaded and
//! generated pieces on top without touching the tree.

use crate::types::{Suggestion, SuggestionKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Default priority of subcommand suggestions.
pub const SUBCOMMAND_PRIORITY: i32 = 100;
/// Default priority of option suggestions.
pub const OPTION_PRIORITY: i32 = 80;

/// One node of the command tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandSpec {
    /// Primary name followed by alternate spellings
    #[serde(deserialize_with = "one_or_many")]
    pub name: Vec<String>,
    /// Extra spellings accepted when matching typed tokens
    pub aliases: Vec<String>,
    /// Help text
    pub description: Option<String>,
    /// Suggestion priority; [`SUBCOMMAND_PRIORITY`] when unset
    pub priority: Option<i32>,
    /// Never suggested, but still matched when typed
    pub hidden: bool,
    /// Child commands
    #[serde(deserialize_with = "skip_invalid")]
    pub subcommands: Vec<CommandSpec>,
    /// Flags accepted at this node
    #[serde(deserialize_with = "skip_invalid")]
    pub options: Vec<OptionSpec>,
    /// Positional argument slots, in order
    #[serde(deserialize_with = "skip_invalid")]
    pub args: Vec<Argument>,
    /// Extra static suggestions shown with the subcommands
    #[serde(deserialize_with = "skip_invalid")]
    pub additional_suggestions: Vec<StaticSuggestion>,
    /// Whether a flag ends a variadic argument run
    pub options_can_break_variadic_arg: bool,
    /// Sub-spec layered under this node when it is reached
    pub load_spec: Option<LoadSpec>,
    /// Generators whose output becomes extra subcommands of this node
    #[serde(deserialize_with = "skip_invalid")]
    pub generate_spec: Vec<Generator>,
}

impl Default for CommandSpec {
    fn default() -> Self {
        Self {
            name: Vec::new(),
            aliases: Vec::new(),
            description: None,
            priority: None,
            hidden: false,
            subcommands: Vec::new(),
            options: Vec::new(),
            args: Vec::new(),
            additional_suggestions: Vec::new(),
            options_can_break_variadic_arg: true,
            load_spec: None,
            generate_spec: Vec::new(),
        }
    }
}

impl CommandSpec {
    /// Create a node with a single name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: vec![name.into()],
            ..Self::default()
        }
    }

    /// Add a child command.
    #[must_use]
    pub fn with_subcommand(mut self, sub: Self) -> Self {
        self.subcommands.push(sub);
        self
    }

    /// Add an option.
    #[must_use]
    pub fn with_option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    /// Add a positional argument slot.
    #[must_use]
    pub fn with_arg(mut self, arg: Argument) -> Self {
        self.args.push(arg);
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The name shown in suggestions; empty if the node has none.
    #[must_use]
    pub fn primary_name(&self) -> &str {
        self.name.first().map_or("", String::as_str)
    }

    /// Whether `token` names this node, by any spelling or alias.
    #[must_use]
    pub fn matches_name(&self, token: &str) -> bool {
        self.name.iter().chain(&self.aliases).any(|n| n == token)
    }

    /// Suggestion for this node as a child of its parent.
    #[must_use]
    pub fn to_suggestion(&self) -> Suggestion {
        Suggestion::new(self.primary_name(), SuggestionKind::Subcommand)
            .with_optional_description(self.description.as_deref())
            .with_priority(self.priority.unwrap_or(SUBCOMMAND_PRIORITY))
    }
}

/// A flag with one or more spellings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionSpec {
    /// Spellings such as `-m` and `--message`
    #[serde(deserialize_with = "one_or_many")]
    pub name: Vec<String>,
    /// Help text
    pub description: Option<String>,
    /// Argument slots consumed after the flag
    #[serde(deserialize_with = "skip_invalid")]
    pub args: Vec<Argument>,
    /// Marked required by the spec author
    #[serde(alias = "required")]
    pub is_required: bool,
    /// May appear more than once
    pub is_repeatable: bool,
    /// Options that cannot be combined with this one
    pub exclusive_on: Vec<String>,
    /// Options that must already be present before this one is offered
    pub depends_on: Vec<String>,
    /// Suggestion priority; [`OPTION_PRIORITY`] when unset
    pub priority: Option<i32>,
    /// Never suggested, but still matched when typed
    pub hidden: bool,
    /// Inherited by every descendant subcommand
    pub is_persistent: bool,
}

impl OptionSpec {
    /// Create an option from its spellings.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Add an argument slot.
    #[must_use]
    pub fn with_arg(mut self, arg: Argument) -> Self {
        self.args.push(arg);
        self
    }

    /// Mark as persistent.
    #[must_use]
    pub const fn persistent(mut self) -> Self {
        self.is_persistent = true;
        self
    }

    /// Whether any spelling equals `token`.
    #[must_use]
    pub fn matches(&self, token: &str, case_sensitive: bool) -> bool {
        self.name.iter().any(|n| {
            if case_sensitive {
                n == token
            } else {
                n.eq_ignore_ascii_case(token)
            }
        })
    }

    /// Whether `other` shares a spelling with this option.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.name.iter().any(|n| other.name.contains(n))
    }

    /// Whether any spelling appears in `names`.
    #[must_use]
    pub fn named_in(&self, names: &[String]) -> bool {
        self.name.iter().any(|n| names.contains(n))
    }

    /// Whether the flag consumes at least one following token.
    #[must_use]
    pub fn takes_args(&self) -> bool {
        !self.args.is_empty()
    }
}

/// A positional value slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Argument {
    /// Display name of the slot
    pub name: Option<String>,
    /// Help text
    pub description: Option<String>,
    /// May be left out
    pub is_optional: bool,
    /// Absorbs every following positional token
    pub is_variadic: bool,
    /// The value names another root command whose spec takes over
    pub is_command: bool,
    /// Built-in suggestion sources
    #[serde(deserialize_with = "skip_invalid")]
    pub template: Vec<Template>,
    /// Fixed suggestions
    #[serde(deserialize_with = "skip_invalid")]
    pub suggestions: Vec<StaticSuggestion>,
    /// Dynamic suggestion sources
    #[serde(deserialize_with = "skip_invalid")]
    pub generators: Vec<Generator>,
    /// Sub-spec attached once a value has been supplied
    pub load_spec: Option<LoadSpec>,
}

impl Argument {
    /// Create a named slot.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Mark optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    /// Mark variadic.
    #[must_use]
    pub const fn variadic(mut self) -> Self {
        self.is_variadic = true;
        self
    }

    /// Add a template.
    #[must_use]
    pub fn with_template(mut self, template: Template) -> Self {
        self.template.push(template);
        self
    }

    /// Add a generator.
    #[must_use]
    pub fn with_generator(mut self, generator: Generator) -> Self {
        self.generators.push(generator);
        self
    }

    /// Add static suggestions by name.
    #[must_use]
    pub fn with_suggestions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions
            .extend(names.into_iter().map(|n| StaticSuggestion::Name(n.into())));
        self
    }
}

/// Built-in suggestion sources for an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    /// Files and directories
    #[serde(alias = "files")]
    Filepaths,
    /// Directories only
    Folders,
    /// Previously typed command lines
    History,
    /// A source this build does not provide (`help`, ...); offers nothing
    #[serde(other)]
    Unknown,
}

/// A fixed suggestion written as a bare string or a full object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StaticSuggestion {
    /// Just the name
    Name(String),
    /// Name plus description, priority, icon...
    Full(Suggestion),
}

impl StaticSuggestion {
    /// Convert to a suggestion, using `kind` for bare names.
    #[must_use]
    pub fn to_suggestion(&self, kind: SuggestionKind) -> Suggestion {
        match self {
            Self::Name(name) => Suggestion::new(name.clone(), kind),
            Self::Full(suggestion) => suggestion.clone(),
        }
    }
}

/// Reference to a spec that is attached lazily.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoadSpec {
    /// Name of another root spec in the registry
    Named(String),
    /// A spec written in place
    Inline(Box<CommandSpec>),
}

/// A dynamic suggestion source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generator {
    /// What to run
    #[serde(flatten)]
    pub kind: GeneratorKind,
    /// How raw output becomes suggestions
    #[serde(default)]
    pub post_process: PostProcess,
    /// Cache behavior
    #[serde(default)]
    pub cache: CachePolicy,
    /// Execution timeout in milliseconds
    #[serde(default, rename = "timeout")]
    pub timeout_ms: Option<u64>,
    /// Delay before executing on a cache miss, in milliseconds
    #[serde(default, rename = "debounce")]
    pub debounce_ms: Option<u64>,
}

impl Generator {
    /// A generator running `script` through the configured shell.
    pub fn script(script: impl Into<String>) -> Self {
        Self::from_kind(GeneratorKind::Script(ScriptCommand::Shell(script.into())))
    }

    /// A generator backed by a registered producer.
    pub fn custom(id: impl Into<String>) -> Self {
        Self::from_kind(GeneratorKind::Custom(id.into()))
    }

    const fn from_kind(kind: GeneratorKind) -> Self {
        Self {
            kind,
            post_process: PostProcess::Lines { dedupe: false },
            cache: CachePolicy::DEFAULT,
            timeout_ms: None,
            debounce_ms: None,
        }
    }

    /// Replace the post-processing step.
    #[must_use]
    pub fn with_post_process(mut self, post_process: PostProcess) -> Self {
        self.post_process = post_process;
        self
    }

    /// Replace the cache policy.
    #[must_use]
    pub const fn with_cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// The two shapes a generator can take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeneratorKind {
    /// External command
    Script(ScriptCommand),
    /// Registered in-process producer, by id
    Custom(String),
}

/// An external command, either a shell line or a direct argv.
///
/// Both forms may contain `{cwd}`, `{token}`, `{tokens}` and `{N}`
/// placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptCommand {
    /// Run through `<shell> -c`
    Shell(String),
    /// Run directly, no shell
    Argv(Vec<String>),
}

/// Maps one output line to a suggestion; `None` drops the line.
pub type LineMapper = Arc<dyn Fn(&str) -> Option<Suggestion> + Send + Sync>;

/// Turns a generator's raw output into suggestions.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PostProcess {
    /// One suggestion per trimmed, non-empty line
    Lines {
        /// Drop repeated names
        #[serde(default)]
        dedupe: bool,
    },
    /// Split each line on a delimiter into name and description fields
    #[serde(rename_all = "camelCase")]
    Split {
        /// Field separator; whitespace runs when empty
        #[serde(default)]
        delimiter: String,
        /// Field index used as the name
        #[serde(default)]
        name_field: usize,
        /// Field index used as the description
        #[serde(default)]
        description_field: Option<usize>,
        /// Number of leading lines to skip (table headers)
        #[serde(default)]
        skip_lines: usize,
    },
    /// Extract name and description from each line with a regular expression
    #[serde(rename_all = "camelCase")]
    Regex {
        /// Pattern applied to every line
        pattern: String,
        /// Capture group holding the name (index or name)
        #[serde(default = "default_name_group")]
        name_group: String,
        /// Capture group holding the description
        #[serde(default)]
        description_group: Option<String>,
    },
    /// Programmatic mapper; cannot appear in spec files
    #[serde(skip)]
    Map(LineMapper),
}

fn default_name_group() -> String {
    "1".to_string()
}

impl Default for PostProcess {
    fn default() -> Self {
        Self::Lines { dedupe: false }
    }
}

impl fmt::Debug for PostProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lines { dedupe } => f.debug_struct("Lines").field("dedupe", dedupe).finish(),
            Self::Split {
                delimiter,
                name_field,
                description_field,
                skip_lines,
            } => f
                .debug_struct("Split")
                .field("delimiter", delimiter)
                .field("name_field", name_field)
                .field("description_field", description_field)
                .field("skip_lines", skip_lines)
                .finish(),
            Self::Regex {
                pattern,
                name_group,
                description_group,
            } => f
                .debug_struct("Regex")
                .field("pattern", pattern)
                .field("name_group", name_group)
                .field("description_group", description_group)
                .finish(),
            Self::Map(_) => f.write_str("Map(<fn>)"),
        }
    }
}

/// When cached generator output is reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStrategy {
    /// Reuse until the TTL expires
    #[default]
    Ttl,
    /// Reuse per working directory
    DirectoryChange,
    /// Reuse while the repository state is unchanged
    GitStatusChange,
}

/// Cache behavior of one generator.
///
/// In spec files this is `false`, `true`, or `{ "ttl": <ms>, "strategy": ... }`.
/// Every strategy also honors the TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CacheRepr", into = "CacheRepr")]
pub struct CachePolicy {
    /// Whether results are cached at all
    pub enabled: bool,
    /// Lifetime in milliseconds; the configured default when unset
    pub ttl_ms: Option<u64>,
    /// Invalidation strategy
    pub strategy: CacheStrategy,
}

impl CachePolicy {
    /// Cached under the default TTL.
    pub const DEFAULT: Self = Self {
        enabled: true,
        ttl_ms: None,
        strategy: CacheStrategy::Ttl,
    };

    /// Never cached.
    pub const DISABLED: Self = Self {
        enabled: false,
        ttl_ms: None,
        strategy: CacheStrategy::Ttl,
    };

    /// Cached with an explicit strategy and TTL.
    #[must_use]
    pub const fn new(strategy: CacheStrategy, ttl_ms: Option<u64>) -> Self {
        Self {
            enabled: true,
            ttl_ms,
            strategy,
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CacheRepr {
    Flag(bool),
    Detailed {
        #[serde(default)]
        ttl: Option<u64>,
        #[serde(default)]
        strategy: CacheStrategy,
    },
}

impl From<CacheRepr> for CachePolicy {
    fn from(repr: CacheRepr) -> Self {
        match repr {
            CacheRepr::Flag(true) => Self::DEFAULT,
            CacheRepr::Flag(false) => Self::DISABLED,
            CacheRepr::Detailed { ttl, strategy } => Self::new(strategy, ttl),
        }
    }
}

impl From<CachePolicy> for CacheRepr {
    fn from(policy: CachePolicy) -> Self {
        if policy.enabled {
            Self::Detailed {
                ttl: policy.ttl_ms,
                strategy: policy.strategy,
            }
        } else {
            Self::Flag(false)
        }
    }
}

/// Accept either `T` or `[T, ...]`.
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}

/// Like [`one_or_many`], but entries that fail to parse are logged and
/// dropped instead of failing the whole node.
fn skip_invalid<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let values: Vec<serde_json::Value> = one_or_many(deserializer)?;
    Ok(values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(error = %e, "skipping malformed spec entry");
                None
            },
        })
        .collect())
}
