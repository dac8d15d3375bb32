use std::path::{Path, PathBuf};

use anyhow::Context;
use regex_lite::Regex;
use serde::Deserialize;

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("arch-check") => arch_check(),
        Some(cmd) => anyhow::bail!("Unknown xtask command: {cmd}"),
        None => anyhow::bail!("Usage: cargo xtask <command>\n\nCommands:\n  arch-check"),
    }
}

#[derive(Debug, Deserialize)]
struct Metadata {
    packages: Vec<Package>,
}

#[derive(Debug, Deserialize)]
struct Package {
    name: String,
    manifest_path: PathBuf,
    dependencies: Vec<Dependency>,
}

#[derive(Debug, Deserialize)]
struct Dependency {
    name: String,
    /// `None` for normal dependencies, `"dev"` / `"build"` otherwise
    kind: Option<String>,
}

const PURE_CRATES: &[&str] = &["storefront-domain", "storefront-protocol"];

// Runtime and I/O crates the pure crates must stay free of
const FORBIDDEN_IN_PURE: &[&str] = &["tokio", "tokio-tungstenite", "reqwest", "axum"];

/// Workspace crates each crate may depend on.
fn allowed_internal(package: &str) -> Option<&'static [&'static str]> {
    match package {
        "storefront-domain" => Some(&[]),
        "storefront-protocol" => Some(&["storefront-domain"]),
        "storefront-client" => Some(&["storefront-domain", "storefront-protocol"]),
        "xtask" => Some(&[]),
        _ => None,
    }
}

fn arch_check() -> anyhow::Result<()> {
    let output = std::process::Command::new("cargo")
        .args(["metadata", "--format-version", "1", "--no-deps"])
        .output()
        .context("running cargo metadata")?;

    if !output.status.success() {
        anyhow::bail!("cargo metadata failed")
    }

    let metadata: Metadata =
        serde_json::from_slice(&output.stdout).context("parsing cargo metadata")?;

    let mut violations = dependency_violations(&metadata.packages);
    for package in &metadata.packages {
        if !PURE_CRATES.contains(&package.name.as_str()) {
            continue;
        }
        let src = package
            .manifest_path
            .parent()
            .map(|dir| dir.join("src"))
            .context("manifest path has no parent")?;
        violations.extend(source_violations(&package.name, &src)?);
    }

    if violations.is_empty() {
        println!("arch-check: {} crates OK", metadata.packages.len());
        return Ok(());
    }

    for violation in &violations {
        eprintln!("  {violation}");
    }
    anyhow::bail!("arch-check failed with {} violation(s)", violations.len())
}

fn dependency_violations(packages: &[Package]) -> Vec<String> {
    let internal: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
    let mut violations = Vec::new();

    for package in packages {
        let Some(allowed) = allowed_internal(&package.name) else {
            violations.push(format!("{}: crate has no layering rule", package.name));
            continue;
        };

        for dep in package.dependencies.iter().filter(|d| d.kind.is_none()) {
            let name = dep.name.as_str();
            if internal.contains(&name) && !allowed.contains(&name) {
                violations.push(format!("{}: must not depend on {name}", package.name));
            }
            if PURE_CRATES.contains(&package.name.as_str()) && FORBIDDEN_IN_PURE.contains(&name) {
                violations.push(format!("{}: pure crate depends on {name}", package.name));
            }
        }
    }

    violations
}

fn source_violations(package: &str, src: &Path) -> anyhow::Result<Vec<String>> {
    let pattern = Regex::new(r"\b(tokio|tokio_tungstenite|reqwest|axum)::")
        .context("compiling source pattern")?;
    let mut violations = Vec::new();

    for file in rust_files(src)? {
        let text = std::fs::read_to_string(&file)
            .with_context(|| format!("reading {}", file.display()))?;
        for (line_no, line) in text.lines().enumerate() {
            if line.trim_start().starts_with("//") {
                continue;
            }
            if let Some(m) = pattern.find(line) {
                violations.push(format!(
                    "{package}: {}:{} uses {}",
                    file.display(),
                    line_no + 1,
                    m.as_str().trim_end_matches("::")
                ));
            }
        }
    }

    Ok(violations)
}

fn rust_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries =
            std::fs::read_dir(&dir).with_context(|| format!("listing {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
