use std::{collections::VecDeque, fmt::Display};

use indexmap::IndexMap;
use semver::Version;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, trace, warn};

use crate::{
    coerce::{LATEST, coerce},
    name::PackageName,
    progress::ProgressSink,
    registry::{Manifest, PackageRegistry, RegistryError},
    visited::VisitedSet,
};

/// Dependency categories to follow beyond runtime `dependencies`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResolveOptions {
    pub dev: bool,
    pub peer: bool,
    pub optional: bool,
}

/// A package pinned to one concrete version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub name: PackageName,
    pub version: Version,
    /// Whether this version is the package's `latest` dist-tag.
    pub latest: bool,
}

impl Resolved {
    /// File name of the tarball written for this package.
    ///
    /// The scope separator is flattened to a hyphen, and versions that are
    /// the `latest` dist-tag carry a marker suffix: `@types/node@20.1.0`
    /// as latest becomes `@types-node-20.1.0-latest.tgz`.
    pub fn file_name(&self) -> String {
        let flat = self.name.flattened();
        if self.latest {
            format!("{flat}-{}-latest.tgz", self.version)
        } else {
            format!("{flat}-{}.tgz", self.version)
        }
    }
}

impl Display for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// One completed edge fetch.
struct Arrival {
    name: PackageName,
    query: String,
    outcome: Result<(Manifest, bool), RegistryError>,
}

/// Walks the dependency graph into a flat, de-duplicated package list.
pub struct Resolver<R> {
    registry: R,
    visited: VisitedSet,
    opts: ResolveOptions,
}

impl<R: PackageRegistry> Resolver<R> {
    pub fn new(registry: R, visited: VisitedSet, opts: ResolveOptions) -> Self {
        Self {
            registry,
            visited,
            opts,
        }
    }

    /// Resolve every dependency reachable from `root`.
    ///
    /// The root manifest itself is not part of the output. Failed edges
    /// degrade to log lines rather than aborting the pass. The sink
    /// advances once per completed root subtree.
    pub async fn resolve(&self, root: &Manifest, sink: &dyn ProgressSink) -> Vec<Resolved> {
        let edges = self.edges(root);
        let total = edges.len();
        let mut out = Vec::new();
        if total == 0 {
            sink.advance(1.0);
            return out;
        }
        let (arrivals, skipped) = self.fetch_level(edges).await;
        let mut done = skipped;
        if done > 0 {
            sink.advance(done as f64 / total as f64);
        }
        for arrival in arrivals {
            let fraction = done as f64 / total as f64;
            if let Some(manifest) = self.settle(arrival, fraction, &mut out) {
                self.expand(manifest, fraction, &mut out).await;
            }
            done += 1;
            sink.advance(done as f64 / total as f64);
        }
        out
    }

    /// Depth-first expansion below one already-emitted package.
    ///
    /// Each level fetches its surviving edges in parallel; across the
    /// arrived manifests the walk continues sequentially, in arrival
    /// order, so a parent is always emitted before its descendants.
    async fn expand(&self, manifest: Manifest, fraction: f64, out: &mut Vec<Resolved>) {
        let mut stack = vec![VecDeque::from([manifest])];
        while let Some(level) = stack.last_mut() {
            let Some(next) = level.pop_front() else {
                stack.pop();
                continue;
            };
            trace!("expanding {} at depth {}", next.name, stack.len());
            let (arrivals, _) = self.fetch_level(self.edges(&next)).await;
            let mut children = VecDeque::new();
            for arrival in arrivals {
                if let Some(manifest) = self.settle(arrival, fraction, out) {
                    children.push_back(manifest);
                }
            }
            if !children.is_empty() {
                stack.push(children);
            }
        }
    }

    /// Apply post-fetch de-duplication and emit the winner.
    fn settle(&self, arrival: Arrival, fraction: f64, out: &mut Vec<Resolved>) -> Option<Manifest> {
        let Arrival {
            name,
            query,
            outcome,
        } = arrival;
        match outcome {
            Ok((manifest, latest)) => {
                let version = manifest.version.clone();
                if !self.visited.insert(&name, &version.to_string()) {
                    trace!("{name}@{version} already resolved");
                    return None;
                }
                debug!(fraction, "resolved {name}@{version}");
                out.push(Resolved {
                    name,
                    version,
                    latest,
                });
                Some(manifest)
            }
            Err(err) => {
                warn!("skipping {name}@{query}: {err}");
                None
            }
        }
    }

    /// Merged dependency map of a manifest, per options.
    ///
    /// Later categories overwrite earlier ranges for the same name, the
    /// same way the manifest objects spread over each other.
    fn edges(&self, manifest: &Manifest) -> IndexMap<String, String> {
        let mut map = manifest.dependencies.clone();
        if self.opts.dev {
            map.extend(manifest.dev_dependencies.clone());
        }
        if self.opts.peer {
            map.extend(manifest.peer_dependencies.clone());
        }
        if self.opts.optional {
            map.extend(manifest.optional_dependencies.clone());
        }
        map
    }

    /// Fetch all surviving edges of one manifest in parallel.
    ///
    /// Returns completed fetches in arrival order plus the count of edges
    /// dropped by the pre-fetch visited check.
    async fn fetch_level(&self, edges: IndexMap<String, String>) -> (Vec<Arrival>, usize) {
        let mut set = JoinSet::new();
        let mut skipped = 0;
        for (raw_name, range) in edges {
            let name: PackageName = match raw_name.parse() {
                Ok(name) => name,
                Err(err) => {
                    warn!("ignoring dependency {raw_name:?}: {err}");
                    skipped += 1;
                    continue;
                }
            };
            let query = coerce(&range);
            if self.visited.contains(&name, &query) {
                trace!("{name}@{query} already visited");
                skipped += 1;
                continue;
            }
            let registry = self.registry.clone();
            let fut = async move {
                let outcome = fetch_edge(registry, &name, &query).await;
                Arrival {
                    name,
                    query,
                    outcome,
                }
            };
            set.spawn(fut.in_current_span());
        }
        let mut arrivals = Vec::new();
        while let Some(res) = set.join_next().await {
            match res {
                Ok(arrival) => arrivals.push(arrival),
                Err(err) => warn!("edge fetch task failed: {err}"),
            }
        }
        (arrivals, skipped)
    }
}

/// Fetch one edge's manifest and settle whether it is the latest version.
///
/// Querying the `latest` tag answers that directly; any other query needs
/// the packument, and a packument failure degrades to `false`.
async fn fetch_edge<R: PackageRegistry>(
    registry: R,
    name: &PackageName,
    query: &str,
) -> Result<(Manifest, bool), RegistryError> {
    let manifest = registry.manifest(name, query).await?;
    if query == LATEST {
        return Ok((manifest, true));
    }
    let latest = match registry.packument(name).await {
        Ok(packument) => {
            let version = manifest.version.to_string();
            packument.latest() == Some(version.as_str())
        }
        Err(err) => {
            debug!("no packument for {name}, assuming not latest: {err}");
            false
        }
    };
    Ok((manifest, latest))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use super::*;
    use crate::{progress::NoProgress, registry::Packument};

    #[derive(Clone, Default)]
    struct MockRegistry {
        manifests: Arc<HashMap<(String, String), Manifest>>,
        packuments: Arc<HashMap<String, Packument>>,
    }

    impl PackageRegistry for MockRegistry {
        async fn manifest(
            &self,
            name: &PackageName,
            version: &str,
        ) -> Result<Manifest, RegistryError> {
            self.manifests
                .get(&(name.as_str().to_string(), version.to_string()))
                .cloned()
                .ok_or_else(|| RegistryError::NotFound {
                    name: name.clone(),
                    query: version.to_string(),
                })
        }

        async fn packument(&self, name: &PackageName) -> Result<Packument, RegistryError> {
            self.packuments
                .get(name.as_str())
                .cloned()
                .ok_or_else(|| RegistryError::NotFound {
                    name: name.clone(),
                    query: LATEST.to_string(),
                })
        }
    }

    fn manifest(name: &str, version: &str, deps: &[(&str, &str)]) -> Manifest {
        Manifest {
            name: name.into(),
            version: Version::parse(version).unwrap(),
            dependencies: deps
                .iter()
                .map(|(n, r)| (n.to_string(), r.to_string()))
                .collect(),
            dev_dependencies: Default::default(),
            peer_dependencies: Default::default(),
            optional_dependencies: Default::default(),
        }
    }

    #[derive(Default)]
    struct Fixture {
        manifests: HashMap<(String, String), Manifest>,
        packuments: HashMap<String, Packument>,
    }

    impl Fixture {
        fn publish(&mut self, name: &str, version: &str, deps: &[(&str, &str)]) -> &mut Self {
            self.insert(manifest(name, version, deps))
        }

        fn insert(&mut self, manifest: Manifest) -> &mut Self {
            let name = manifest.name.clone();
            let version = manifest.version.to_string();
            self.manifests
                .insert((name.clone(), version.clone()), manifest);
            let packument = self
                .packuments
                .entry(name.clone())
                .or_insert_with(|| Packument {
                    name: name.clone(),
                    versions: Default::default(),
                    dist_tags: Default::default(),
                    time: Default::default(),
                });
            packument.versions.insert(version, serde_json::Value::Null);
            let latest = packument
                .versions
                .keys()
                .filter_map(|v| Version::parse(v).ok())
                .max()
                .unwrap()
                .to_string();
            packument.dist_tags.insert(LATEST.into(), latest.clone());
            let tagged = self.manifests[&(name.clone(), latest)].clone();
            self.manifests.insert((name, LATEST.into()), tagged);
            self
        }

        fn registry(&self) -> MockRegistry {
            MockRegistry {
                manifests: Arc::new(self.manifests.clone()),
                packuments: Arc::new(self.packuments.clone()),
            }
        }

        fn resolver(&self, opts: ResolveOptions) -> Resolver<MockRegistry> {
            Resolver::new(self.registry(), VisitedSet::new(), opts)
        }
    }

    fn root(deps: &[(&str, &str)]) -> Manifest {
        Manifest::root(
            deps.iter()
                .map(|(n, r)| (n.to_string(), r.to_string()))
                .collect(),
        )
    }

    fn keys(out: &[Resolved]) -> Vec<String> {
        let mut keys: Vec<_> = out.iter().map(Resolved::to_string).collect();
        keys.sort();
        keys
    }

    #[tokio::test]
    async fn single_package_without_dependencies() {
        let mut fx = Fixture::default();
        fx.publish("left-pad", "1.3.0", &[]);
        let out = fx
            .resolver(Default::default())
            .resolve(&root(&[("left-pad", "1.3.0")]), &NoProgress)
            .await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to_string(), "left-pad@1.3.0");
        assert!(out[0].latest);
        assert_eq!(out[0].file_name(), "left-pad-1.3.0-latest.tgz");
    }

    #[tokio::test]
    async fn walks_transitive_dependencies() {
        let mut fx = Fixture::default();
        fx.publish("b", "2.0.0", &[("c", "^1.0.0")])
            .publish("c", "1.0.0", &[])
            .publish("c", "1.2.0", &[]);
        let out = fx
            .resolver(Default::default())
            .resolve(&root(&[("b", "latest")]), &NoProgress)
            .await;
        assert_eq!(keys(&out), ["b@2.0.0", "c@1.0.0"]);
        let b = out.iter().find(|p| p.name.as_str() == "b").unwrap();
        let c = out.iter().find(|p| p.name.as_str() == "c").unwrap();
        assert!(b.latest);
        assert!(!c.latest, "1.0.0 is not c's latest");
        assert_eq!(c.file_name(), "c-1.0.0.tgz");
    }

    #[tokio::test]
    async fn cycles_terminate() {
        let mut fx = Fixture::default();
        fx.publish("a", "1.0.0", &[("b", "1.0.0")])
            .publish("b", "1.0.0", &[("a", "1.0.0")]);
        let out = fx
            .resolver(Default::default())
            .resolve(&root(&[("a", "1.0.0")]), &NoProgress)
            .await;
        assert_eq!(keys(&out), ["a@1.0.0", "b@1.0.0"]);
    }

    #[tokio::test]
    async fn shared_dependencies_appear_once() {
        let mut fx = Fixture::default();
        fx.publish("a", "1.0.0", &[("c", "1.0.0")])
            .publish("b", "1.0.0", &[("c", "1.0.0")])
            .publish("c", "1.0.0", &[]);
        let out = fx
            .resolver(Default::default())
            .resolve(&root(&[("a", "1.0.0"), ("b", "1.0.0")]), &NoProgress)
            .await;
        assert_eq!(keys(&out), ["a@1.0.0", "b@1.0.0", "c@1.0.0"]);
    }

    #[tokio::test]
    async fn failed_edges_do_not_abort_the_pass() {
        let mut fx = Fixture::default();
        fx.publish("a", "1.0.0", &[]);
        let out = fx
            .resolver(Default::default())
            .resolve(&root(&[("a", "1.0.0"), ("ghost", "1.0.0")]), &NoProgress)
            .await;
        assert_eq!(keys(&out), ["a@1.0.0"]);
    }

    #[tokio::test]
    async fn dev_dependencies_are_gated_by_options() {
        let mut fx = Fixture::default();
        let mut a = manifest("a", "1.0.0", &[]);
        a.dev_dependencies.insert("d".into(), "1.0.0".into());
        fx.insert(a).publish("d", "1.0.0", &[]);

        let out = fx
            .resolver(Default::default())
            .resolve(&root(&[("a", "1.0.0")]), &NoProgress)
            .await;
        assert_eq!(keys(&out), ["a@1.0.0"]);

        let opts = ResolveOptions {
            dev: true,
            ..Default::default()
        };
        let out = fx
            .resolver(opts)
            .resolve(&root(&[("a", "1.0.0")]), &NoProgress)
            .await;
        assert_eq!(keys(&out), ["a@1.0.0", "d@1.0.0"]);
    }

    #[tokio::test]
    async fn later_categories_overwrite_earlier_ranges() {
        let mut fx = Fixture::default();
        let mut a = manifest("a", "1.0.0", &[("x", "1.0.0")]);
        a.dev_dependencies.insert("x".into(), "2.0.0".into());
        fx.insert(a).publish("x", "1.0.0", &[]).publish("x", "2.0.0", &[]);

        let opts = ResolveOptions {
            dev: true,
            ..Default::default()
        };
        let out = fx
            .resolver(opts)
            .resolve(&root(&[("a", "1.0.0")]), &NoProgress)
            .await;
        assert_eq!(keys(&out), ["a@1.0.0", "x@2.0.0"]);
    }

    #[tokio::test]
    async fn parents_precede_their_descendants() {
        let mut fx = Fixture::default();
        fx.publish("a", "1.0.0", &[("b", "1.0.0")])
            .publish("b", "1.0.0", &[("c", "1.0.0")])
            .publish("c", "1.0.0", &[]);
        let out = fx
            .resolver(Default::default())
            .resolve(&root(&[("a", "1.0.0")]), &NoProgress)
            .await;
        let pos = |n: &str| out.iter().position(|p| p.name.as_str() == n).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[tokio::test]
    async fn repeated_passes_yield_the_same_set() {
        let mut fx = Fixture::default();
        fx.publish("a", "1.0.0", &[("c", "1.0.0"), ("d", "1.0.0")])
            .publish("b", "1.0.0", &[("c", "1.0.0")])
            .publish("c", "1.0.0", &[("d", "1.0.0")])
            .publish("d", "1.0.0", &[]);
        let seeds = root(&[("a", "1.0.0"), ("b", "1.0.0")]);
        let first = fx
            .resolver(Default::default())
            .resolve(&seeds, &NoProgress)
            .await;
        let second = fx
            .resolver(Default::default())
            .resolve(&seeds, &NoProgress)
            .await;
        assert_eq!(keys(&first), keys(&second));
        assert_eq!(keys(&first), ["a@1.0.0", "b@1.0.0", "c@1.0.0", "d@1.0.0"]);
    }

    #[test]
    fn scoped_file_names_flatten_the_slash() {
        let pack = Resolved {
            name: "@scope/foo".parse().unwrap(),
            version: Version::new(1, 2, 3),
            latest: true,
        };
        assert_eq!(pack.file_name(), "@scope-foo-1.2.3-latest.tgz");
        let pack = Resolved { latest: false, ..pack };
        assert_eq!(pack.file_name(), "@scope-foo-1.2.3.tgz");
    }
}
