//! Producers available to every spec through `"custom": "<id>"`.

use super::Producer;
use crate::types::{CompletionContext, Suggestion, SuggestionKind};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Environment variable names from the request's environment.
#[derive(Debug, Default)]
pub struct EnvVars;

#[async_trait]
impl Producer for EnvVars {
    async fn produce(&self, ctx: &CompletionContext) -> Result<Vec<Suggestion>> {
        let mut names: Vec<&String> = ctx.env.keys().filter(|k| !k.is_empty()).collect();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| {
                Suggestion::new(name.clone(), SuggestionKind::Argument)
                    .with_description("Environment variable")
            })
            .collect())
    }
}

const COMMON_PORTS: &[(&str, &str)] = &[
    ("80", "HTTP"),
    ("443", "HTTPS"),
    ("3000", "Node.js/React dev"),
    ("3001", "Alt dev server"),
    ("4000", "GraphQL/Phoenix"),
    ("5000", "Flask/Python"),
    ("5173", "Vite"),
    ("5432", "PostgreSQL"),
    ("6379", "Redis"),
    ("8000", "Django/FastAPI"),
    ("8080", "HTTP alt/Tomcat"),
    ("8443", "HTTPS alt"),
    ("9000", "PHP-FPM/SonarQube"),
    ("27017", "MongoDB"),
];

/// Well-known development ports.
#[derive(Debug, Default)]
pub struct Ports;

#[async_trait]
impl Producer for Ports {
    async fn produce(&self, _ctx: &CompletionContext) -> Result<Vec<Suggestion>> {
        Ok(COMMON_PORTS
            .iter()
            .map(|(port, desc)| {
                Suggestion::new(*port, SuggestionKind::Argument).with_description(*desc)
            })
            .collect())
    }
}

/// Entries of `package.json` in the working directory.
#[derive(Debug, Clone, Copy)]
pub enum PackageJson {
    /// Keys of `scripts`, described by their command
    Scripts,
    /// Keys of `dependencies` and `devDependencies`
    Dependencies,
}

#[async_trait]
impl Producer for PackageJson {
    async fn produce(&self, ctx: &CompletionContext) -> Result<Vec<Suggestion>> {
        let path = ctx.cwd.join("package.json");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let manifest: Value = serde_json::from_str(&content)
            .map_err(|e| Error::Generator(format!("{}: {e}", path.display())))?;

        let suggestions = match self {
            Self::Scripts => object_entries(&manifest, "scripts")
                .map(|(name, command)| {
                    let description: String =
                        command.as_str().unwrap_or_default().chars().take(50).collect();
                    Suggestion::new(name, SuggestionKind::Argument).with_description(description)
                })
                .collect(),
            Self::Dependencies => object_entries(&manifest, "dependencies")
                .chain(object_entries(&manifest, "devDependencies"))
                .map(|(name, _)| {
                    Suggestion::new(name, SuggestionKind::Argument)
                        .with_description("Installed package")
                })
                .collect(),
        };
        Ok(suggestions)
    }
}

fn object_entries<'a>(
    manifest: &'a Value,
    field: &str,
) -> impl Iterator<Item = (&'a String, &'a Value)> {
    manifest
        .get(field)
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|map| map.iter())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_env_vars_sorted() {
        let env = HashMap::from([
            ("PATH".to_string(), "/bin".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ]);
        let ctx = CompletionContext::at_end("echo $", "/").with_env(env);
        let out = EnvVars.produce(&ctx).await.unwrap();
        let names: Vec<_> = out.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["HOME", "PATH"]);
    }

    #[tokio::test]
    async fn test_ports() {
        let out = Ports.produce(&CompletionContext::default()).await.unwrap();
        assert!(out.iter().any(|s| s.name == "5432"));
    }

    #[tokio::test]
    async fn test_package_json_scripts_and_deps() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"scripts":{"build":"tsc -p .","test":"vitest"},
                "dependencies":{"react":"^18"},"devDependencies":{"vitest":"^1"}}"#,
        )
        .unwrap();
        let ctx = CompletionContext::at_end("npm run ", dir.path());

        let scripts = PackageJson::Scripts.produce(&ctx).await.unwrap();
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[0].description.as_deref(), Some("tsc -p ."));

        let deps = PackageJson::Dependencies.produce(&ctx).await.unwrap();
        let names: Vec<_> = deps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["react", "vitest"]);
    }

    #[tokio::test]
    async fn test_package_json_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let ctx = CompletionContext::at_end("npm run ", dir.path());
        assert!(PackageJson::Scripts.produce(&ctx).await.unwrap().is_empty());
    }
}
