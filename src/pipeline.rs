use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::fs::{create_dir_all, read_dir, remove_dir};
use tracing::{Instrument, info, info_span};

use crate::{
    Offpack,
    download::{DownloadOptions, Downloader},
    pbar::SpanProgress,
    registry::Manifest,
    resolve::{ResolveOptions, Resolver},
    seed::{manifest_from_file, manifest_from_specs},
    top::top_seeds,
};

/// Where the root packages of a fetch come from.
#[derive(Clone, Debug)]
pub enum RootSpec {
    /// Explicit `name[@range]` specs.
    Specs(Vec<String>),
    /// The `dependencies` of a manifest file.
    ManifestFile(PathBuf),
    /// The N most popular packages on the registry.
    Top(usize),
}

impl RootSpec {
    /// Seed acquisition counts as a stage of its own for top-N runs.
    fn stages(&self) -> usize {
        match self {
            RootSpec::Top(_) => 3,
            _ => 2,
        }
    }
}

/// Aggregate counts of one fetch run.
#[derive(Clone, Copy, Debug, Default)]
pub struct FetchReport {
    pub resolved: usize,
    pub downloaded: usize,
    pub cached: usize,
    pub failed: usize,
}

impl Offpack {
    /// Resolve the root specification and mirror every reachable package
    /// into the destination directory.
    pub async fn fetch(
        &self,
        root: RootSpec,
        resolve: ResolveOptions,
        download: DownloadOptions,
    ) -> anyhow::Result<FetchReport> {
        let stages = root.stages();
        let offset = stages - 2;
        let manifest = self.root_manifest(root, stages).await?;

        info!("({}/{stages}) resolving dependency tree", 1 + offset);
        self.visited.reset();
        let resolver = Resolver::new(self.registry.clone(), self.visited.clone(), resolve);
        let span = info_span!("resolve");
        let sink = SpanProgress::new(span.clone(), "resolving");
        let packs = resolver.resolve(&manifest, &sink).instrument(span).await;
        let resolved = packs.len();
        info!("resolved {resolved} packages");

        info!(
            "({}/{stages}) downloading to {}",
            2 + offset,
            download.dest.display()
        );
        create_dir_all(&download.dest)
            .await
            .with_context(|| format!("creating {}", download.dest.display()))?;
        let downloader = Downloader::new(self.registry.clone(), self.cache.clone());
        let span = info_span!("download");
        let sink = SpanProgress::new(span.clone(), "downloading");
        let report = downloader
            .run(packs, &download, &sink)
            .instrument(span)
            .await?;

        if report.fulfilled() == 0 && dir_is_empty(&download.dest).await? {
            remove_dir(&download.dest).await?;
            info!(
                "no packages fetched, removed empty {}",
                download.dest.display()
            );
        }

        Ok(FetchReport {
            resolved,
            downloaded: report.fulfilled(),
            cached: report.cached,
            failed: report.rejected(),
        })
    }

    async fn root_manifest(&self, root: RootSpec, stages: usize) -> anyhow::Result<Manifest> {
        match root {
            RootSpec::Specs(specs) => Ok(manifest_from_specs(&specs)),
            RootSpec::ManifestFile(path) => manifest_from_file(path).await,
            RootSpec::Top(quantity) => {
                info!("(1/{stages}) collecting the {quantity} most popular packages");
                let seeds = top_seeds(&self.registry, quantity).await?;
                Ok(Manifest::root(seeds))
            }
        }
    }
}

async fn dir_is_empty(path: &Path) -> anyhow::Result<bool> {
    let mut entries = read_dir(path).await?;
    Ok(entries.next_entry().await?.is_none())
}
