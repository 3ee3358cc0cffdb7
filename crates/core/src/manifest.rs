//! Dependency Manifest Parsing
//!
//! Extracts declared dependencies from the manifest files the indexer knows
//! about. Parsing is lenient: entries that cannot be understood are skipped
//! rather than failing the whole manifest, but a manifest that is not valid
//! JSON/TOML at all is reported as a parse error.

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

/// Manifest file names looked up at the workspace root, in lookup order.
pub const MANIFEST_FILES: &[&str] = &[
    "package.json",
    "Cargo.toml",
    "requirements.txt",
    "pyproject.toml",
    "go.mod",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Production,
    Development,
}

impl DependencyType {
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyType::Production => "production",
            DependencyType::Development => "development",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "production" => Some(DependencyType::Production),
            "development" => Some(DependencyType::Development),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub dep_type: DependencyType,
}

impl Dependency {
    fn new(name: impl Into<String>, version: impl Into<String>, dep_type: DependencyType) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            dep_type,
        }
    }
}

/// Parse a manifest by its file name.
///
/// Returns `Ok(None)` for file names that are not a known manifest.
pub fn parse_manifest(file_name: &str, content: &str) -> CoreResult<Option<Vec<Dependency>>> {
    let deps = match file_name {
        "package.json" => parse_package_json(content)?,
        "Cargo.toml" => parse_cargo_toml(content)?,
        "requirements.txt" => parse_requirements_txt(content),
        "pyproject.toml" => parse_pyproject_toml(content)?,
        "go.mod" => parse_go_mod(content),
        _ => return Ok(None),
    };
    Ok(Some(deps))
}

// ---------------------------------------------------------------------------
// npm
// ---------------------------------------------------------------------------

fn parse_package_json(content: &str) -> CoreResult<Vec<Dependency>> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let mut deps = Vec::new();

    for (section, dep_type) in [
        ("dependencies", DependencyType::Production),
        ("devDependencies", DependencyType::Development),
    ] {
        if let Some(table) = value.get(section).and_then(|v| v.as_object()) {
            for (name, version) in table {
                let version = version.as_str().unwrap_or("*");
                deps.push(Dependency::new(name, version, dep_type));
            }
        }
    }

    Ok(deps)
}

// ---------------------------------------------------------------------------
// cargo
// ---------------------------------------------------------------------------

fn cargo_version(spec: &toml::Value) -> String {
    match spec {
        toml::Value::String(v) => v.clone(),
        toml::Value::Table(t) => {
            if let Some(v) = t.get("version").and_then(|v| v.as_str()) {
                v.to_string()
            } else if let Some(p) = t.get("path").and_then(|v| v.as_str()) {
                format!("path:{}", p)
            } else if let Some(g) = t.get("git").and_then(|v| v.as_str()) {
                format!("git:{}", g)
            } else if t.get("workspace").and_then(|v| v.as_bool()) == Some(true) {
                "workspace".to_string()
            } else {
                "*".to_string()
            }
        }
        _ => "*".to_string(),
    }
}

fn push_cargo_table(deps: &mut Vec<Dependency>, table: Option<&toml::Value>, dep_type: DependencyType) {
    if let Some(table) = table.and_then(|t| t.as_table()) {
        for (name, spec) in table {
            deps.push(Dependency::new(name, cargo_version(spec), dep_type));
        }
    }
}

fn parse_cargo_toml(content: &str) -> CoreResult<Vec<Dependency>> {
    let value: toml::Value = toml::from_str(content)?;
    let mut deps = Vec::new();

    push_cargo_table(&mut deps, value.get("dependencies"), DependencyType::Production);
    push_cargo_table(&mut deps, value.get("dev-dependencies"), DependencyType::Development);
    push_cargo_table(&mut deps, value.get("build-dependencies"), DependencyType::Development);
    push_cargo_table(
        &mut deps,
        value.get("workspace").and_then(|w| w.get("dependencies")),
        DependencyType::Production,
    );

    Ok(deps)
}

// ---------------------------------------------------------------------------
// pip
// ---------------------------------------------------------------------------

/// Split a PEP 508 requirement like `requests[socks]>=2.0; python_version>"3"`
/// into `(name, version)`.
fn split_requirement(spec: &str) -> Option<(String, String)> {
    let spec = spec.split(';').next().unwrap_or("").trim();
    if spec.is_empty() {
        return None;
    }

    let name_end = spec
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
        .unwrap_or(spec.len());
    let name = &spec[..name_end];
    if name.is_empty() {
        return None;
    }

    let mut rest = spec[name_end..].trim_start();
    if rest.starts_with('[') {
        rest = rest.find(']').map(|i| rest[i + 1..].trim_start()).unwrap_or("");
    }
    let rest = rest.trim_start_matches(['(', ' ']).trim_end_matches([')', ' ']);
    let version = if rest.is_empty() { "*" } else { rest };

    Some((name.to_string(), version.to_string()))
}

fn parse_requirements_txt(content: &str) -> Vec<Dependency> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty() && !line.starts_with('-'))
        .filter_map(split_requirement)
        .map(|(name, version)| Dependency::new(name, version, DependencyType::Production))
        .collect()
}

fn push_pep508_array(deps: &mut Vec<Dependency>, array: Option<&toml::Value>, dep_type: DependencyType) {
    if let Some(items) = array.and_then(|a| a.as_array()) {
        for item in items.iter().filter_map(|i| i.as_str()) {
            if let Some((name, version)) = split_requirement(item) {
                deps.push(Dependency::new(name, version, dep_type));
            }
        }
    }
}

fn parse_pyproject_toml(content: &str) -> CoreResult<Vec<Dependency>> {
    let value: toml::Value = toml::from_str(content)?;
    let mut deps = Vec::new();

    if let Some(project) = value.get("project") {
        push_pep508_array(&mut deps, project.get("dependencies"), DependencyType::Production);
        if let Some(optional) = project.get("optional-dependencies").and_then(|o| o.as_table()) {
            for group in optional.values() {
                push_pep508_array(&mut deps, Some(group), DependencyType::Development);
            }
        }
    }

    if let Some(poetry) = value.get("tool").and_then(|t| t.get("poetry")) {
        if let Some(table) = poetry.get("dependencies").and_then(|d| d.as_table()) {
            for (name, spec) in table.iter().filter(|(name, _)| name.as_str() != "python") {
                deps.push(Dependency::new(name, cargo_version(spec), DependencyType::Production));
            }
        }
        push_cargo_table(
            &mut deps,
            poetry.get("dev-dependencies"),
            DependencyType::Development,
        );
        if let Some(groups) = poetry.get("group").and_then(|g| g.as_table()) {
            for group in groups.values() {
                push_cargo_table(&mut deps, group.get("dependencies"), DependencyType::Development);
            }
        }
    }

    Ok(deps)
}

// ---------------------------------------------------------------------------
// go
// ---------------------------------------------------------------------------

fn go_requirement(line: &str) -> Option<Dependency> {
    let line = line.split("//").next().unwrap_or("").trim();
    let mut parts = line.split_whitespace();
    let name = parts.next()?;
    let version = parts.next().unwrap_or("*");
    Some(Dependency::new(name, version, DependencyType::Production))
}

fn parse_go_mod(content: &str) -> Vec<Dependency> {
    let mut deps = Vec::new();
    let mut in_block = false;

    for line in content.lines() {
        let trimmed = line.trim();
        if in_block {
            if trimmed.starts_with(')') {
                in_block = false;
            } else if let Some(dep) = go_requirement(trimmed) {
                deps.push(dep);
            }
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("require") {
            let rest = rest.trim();
            if rest.starts_with('(') {
                in_block = true;
            } else if let Some(dep) = go_requirement(rest) {
                deps.push(dep);
            }
        }
    }

    deps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(deps: &'a [Dependency], name: &str) -> &'a Dependency {
        deps.iter()
            .find(|d| d.name == name)
            .unwrap_or_else(|| panic!("missing dependency {}", name))
    }

    #[test]
    fn package_json_sections() {
        let content = r#"{
            "name": "app",
            "dependencies": { "react": "^18.2.0", "zod": "3.22.0" },
            "devDependencies": { "vitest": "^1.0.0" }
        }"#;
        let deps = parse_manifest("package.json", content).unwrap().unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(find(&deps, "react").dep_type, DependencyType::Production);
        assert_eq!(find(&deps, "react").version, "^18.2.0");
        assert_eq!(find(&deps, "vitest").dep_type, DependencyType::Development);
    }

    #[test]
    fn package_json_without_dependencies() {
        let deps = parse_manifest("package.json", r#"{"name":"x"}"#)
            .unwrap()
            .unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn invalid_package_json_is_an_error() {
        assert!(parse_manifest("package.json", "{ not json").is_err());
    }

    #[test]
    fn cargo_toml_sections() {
        let content = r#"
[package]
name = "demo"

[dependencies]
serde = { version = "1", features = ["derive"] }
tokio = "1.35"
local = { path = "../local" }

[dev-dependencies]
tempfile = "3"
"#;
        let deps = parse_manifest("Cargo.toml", content).unwrap().unwrap();
        assert_eq!(deps.len(), 4);
        assert_eq!(find(&deps, "serde").version, "1");
        assert_eq!(find(&deps, "tokio").version, "1.35");
        assert_eq!(find(&deps, "local").version, "path:../local");
        assert_eq!(find(&deps, "tempfile").dep_type, DependencyType::Development);
    }

    #[test]
    fn requirements_txt_lines() {
        let content = "\
# comment
requests>=2.31.0
flask==3.0.0  # web
-r other.txt
uvicorn[standard]>=0.24; python_version >= \"3.8\"
numpy
";
        let deps = parse_manifest("requirements.txt", content).unwrap().unwrap();
        assert_eq!(deps.len(), 4);
        assert_eq!(find(&deps, "requests").version, ">=2.31.0");
        assert_eq!(find(&deps, "flask").version, "==3.0.0");
        assert_eq!(find(&deps, "uvicorn").version, ">=0.24");
        assert_eq!(find(&deps, "numpy").version, "*");
    }

    #[test]
    fn pyproject_project_table() {
        let content = r#"
[project]
name = "svc"
dependencies = ["httpx>=0.25", "pydantic"]

[project.optional-dependencies]
dev = ["pytest>=7"]
"#;
        let deps = parse_manifest("pyproject.toml", content).unwrap().unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(find(&deps, "httpx").version, ">=0.25");
        assert_eq!(find(&deps, "pydantic").version, "*");
        assert_eq!(find(&deps, "pytest").dep_type, DependencyType::Development);
    }

    #[test]
    fn pyproject_poetry_tables() {
        let content = r#"
[tool.poetry.dependencies]
python = "^3.11"
fastapi = "^0.110"

[tool.poetry.group.dev.dependencies]
black = "^24"
"#;
        let deps = parse_manifest("pyproject.toml", content).unwrap().unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(find(&deps, "fastapi").dep_type, DependencyType::Production);
        assert_eq!(find(&deps, "black").dep_type, DependencyType::Development);
    }

    #[test]
    fn go_mod_require_forms() {
        let content = r#"module example.com/app

go 1.22

require github.com/pkg/errors v0.9.1

require (
    github.com/gin-gonic/gin v1.9.1
    golang.org/x/sync v0.6.0 // indirect
)
"#;
        let deps = parse_manifest("go.mod", content).unwrap().unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(find(&deps, "github.com/gin-gonic/gin").version, "v1.9.1");
        assert_eq!(find(&deps, "golang.org/x/sync").version, "v0.6.0");
    }

    #[test]
    fn unknown_manifest_is_none() {
        assert!(parse_manifest("Gemfile", "gem 'rails'").unwrap().is_none());
    }
}
