//! Root specs indexed by command name.

use crate::spec::CommandSpec;
use crate::{Error, Result};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A root spec matched by [`SpecRegistry::search`].
#[derive(Debug, Clone)]
pub struct SpecSearchResult {
    /// The matched spec
    pub spec: Arc<CommandSpec>,
    /// Fuzzy score; higher is better
    pub score: i64,
    /// Which field matched: `name`, `alias` or `description`
    pub match_field: &'static str,
}

/// Every root spec the resolver can start from.
#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    specs: Vec<Arc<CommandSpec>>,
    by_name: HashMap<String, usize>,
}

impl SpecRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` file in `dirs`. Missing directories are skipped;
    /// files that fail to parse are logged and skipped.
    #[must_use]
    pub fn load_dirs(dirs: &[PathBuf]) -> Self {
        let mut registry = Self::new();
        for dir in dirs {
            let Ok(read_dir) = std::fs::read_dir(dir) else {
                debug!(dir = %dir.display(), "spec directory not readable");
                continue;
            };
            let mut files: Vec<PathBuf> = read_dir
                .filter_map(std::result::Result::ok)
                .map(|entry| entry.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            files.sort();

            for file in files {
                match load_file(&file) {
                    Ok(specs) => {
                        for spec in specs {
                            registry.register(spec);
                        }
                    },
                    Err(e) => warn!(file = %file.display(), error = %e, "skipping spec file"),
                }
            }
        }
        info!(specs = registry.len(), "spec registry loaded");
        registry
    }

    /// Add a root spec. A later spec with the same name replaces the earlier,
    /// and none of the replaced spec's names keep pointing at it.
    pub fn register(&mut self, spec: CommandSpec) {
        let spec = Arc::new(spec);
        let names: Vec<String> = spec.name.iter().chain(&spec.aliases).cloned().collect();

        let index = match names.iter().find_map(|n| self.by_name.get(n).copied()) {
            Some(existing) => {
                debug!(name = spec.primary_name(), "replacing spec");
                let old = std::mem::replace(&mut self.specs[existing], spec);
                for name in old.name.iter().chain(&old.aliases) {
                    if self.by_name.get(name) == Some(&existing) {
                        self.by_name.remove(name);
                    }
                }
                existing
            },
            None => {
                self.specs.push(spec);
                self.specs.len() - 1
            },
        };
        for name in names {
            self.by_name.insert(name, index);
        }
    }

    /// Root spec for `command`, by name or alias.
    #[must_use]
    pub fn get(&self, command: &str) -> Option<&Arc<CommandSpec>> {
        self.by_name.get(command).map(|&index| &self.specs[index])
    }

    /// Every root spec, in registration order.
    pub fn roots(&self) -> impl Iterator<Item = &Arc<CommandSpec>> {
        self.specs.iter()
    }

    /// Number of root specs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether no spec is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Fuzzy search over names, aliases and descriptions, best first.
    /// An empty query lists everything.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<SpecSearchResult> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self
                .specs
                .iter()
                .map(|spec| SpecSearchResult {
                    spec: Arc::clone(spec),
                    score: 0,
                    match_field: "name",
                })
                .collect();
        }

        let matcher = SkimMatcherV2::default();
        let mut results: Vec<SpecSearchResult> = self
            .specs
            .iter()
            .filter_map(|spec| {
                let mut best: Option<(i64, &'static str)> = None;
                let mut consider = |score: Option<i64>, field: &'static str| {
                    if let Some(score) = score {
                        if best.is_none_or(|(b, _)| score > b) {
                            best = Some((score, field));
                        }
                    }
                };

                for name in &spec.name {
                    consider(matcher.fuzzy_match(&name.to_lowercase(), &query), "name");
                }
                for alias in &spec.aliases {
                    consider(matcher.fuzzy_match(&alias.to_lowercase(), &query), "alias");
                }
                if let Some(description) = &spec.description {
                    // Description hits count half
                    consider(
                        matcher
                            .fuzzy_match(&description.to_lowercase(), &query)
                            .map(|s| s / 2),
                        "description",
                    );
                }

                best.map(|(score, match_field)| SpecSearchResult {
                    spec: Arc::clone(spec),
                    score,
                    match_field,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.spec.primary_name().cmp(b.spec.primary_name()))
        });
        results
    }
}

/// Parse one spec file holding a single spec or an array of them.
///
/// In an array, an entry that does not parse or has no name is logged and
/// skipped; the file only fails when nothing usable is left.
pub fn load_file(path: &Path) -> Result<Vec<CommandSpec>> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        single => vec![single],
    };

    let total = entries.len();
    let mut specs = Vec::with_capacity(total);
    let mut last_error = None;
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<CommandSpec>(entry) {
            Ok(spec) if spec.primary_name().is_empty() => {
                warn!(file = %path.display(), index, "skipping spec without a name");
                last_error = Some(Error::Spec(format!(
                    "{}: spec #{index} has no name",
                    path.display()
                )));
            },
            Ok(spec) => specs.push(spec),
            Err(e) => {
                warn!(file = %path.display(), index, error = %e, "skipping malformed spec");
                last_error = Some(e.into());
            },
        }
    }

    match last_error {
        Some(e) if specs.is_empty() && total > 0 => Err(e),
        _ => Ok(specs),
    }
}
