use std::path::Path;

use anyhow::{Context, bail};
use indexmap::IndexMap;
use serde::Deserialize;
use tokio::fs::read_to_string;

use crate::{coerce::LATEST, registry::Manifest};

/// Split a raw spec like `name`, `name@^1.2.3` or `@scope/name@latest`
/// into its name and range parts. An absent range means `latest`.
pub fn split_spec(raw: &str) -> (&str, &str) {
    let (name, range) = match raw.strip_prefix('@') {
        Some(rest) => match rest.split_once('@') {
            Some((scoped, range)) => (&raw[..scoped.len() + 1], range),
            None => (raw, ""),
        },
        None => raw.split_once('@').unwrap_or((raw, "")),
    };
    if range.is_empty() { (name, LATEST) } else { (name, range) }
}

/// Root manifest from explicit command-line specs.
pub fn manifest_from_specs(specs: &[String]) -> Manifest {
    let deps = specs
        .iter()
        .map(|raw| {
            let (name, range) = split_spec(raw);
            (name.to_string(), range.to_string())
        })
        .collect();
    Manifest::root(deps)
}

#[derive(Debug, Default, Deserialize)]
struct RootFile {
    dependencies: Option<IndexMap<String, String>>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: IndexMap<String, String>,
    #[serde(default, rename = "peerDependencies")]
    peer_dependencies: IndexMap<String, String>,
    #[serde(default, rename = "optionalDependencies")]
    optional_dependencies: IndexMap<String, String>,
}

/// Root manifest from a `package.json`-style file.
///
/// A missing file or a file without a `dependencies` field is a hard
/// error; this boundary is strict where the resolver is lenient.
pub async fn manifest_from_file(path: impl AsRef<Path>) -> anyhow::Result<Manifest> {
    let path = path.as_ref();
    let text = read_to_string(path)
        .await
        .with_context(|| format!("cannot read manifest {}", path.display()))?;
    let file: RootFile = serde_json::from_str(&text)
        .with_context(|| format!("malformed manifest {}", path.display()))?;
    let Some(dependencies) = file.dependencies else {
        bail!("{} has no dependencies field", path.display());
    };
    let mut manifest = Manifest::root(dependencies);
    manifest.dev_dependencies = file.dev_dependencies;
    manifest.peer_dependencies = file.peer_dependencies;
    manifest.optional_dependencies = file.optional_dependencies;
    Ok(manifest)
}
