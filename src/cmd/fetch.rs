use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;

use crate::{
    Offpack, cmd::Execute, download::DownloadOptions, pipeline::RootSpec, resolve::ResolveOptions,
};

/// Resolve packages and download their tarballs for offline use.
#[derive(Clone, Debug, Parser)]
pub struct Fetch {
    /// Package specs such as `left-pad`, `react@18.2.0` or `@types/node@^20`.
    #[arg(value_name = "PACKAGE")]
    pub packages: Vec<String>,

    /// Resolve the dependencies of a manifest file instead.
    #[arg(short, long, value_name = "PATH", conflicts_with = "packages")]
    pub file: Option<PathBuf>,

    /// Mirror the N most popular packages on the registry.
    #[arg(short, long, value_name = "N", conflicts_with_all = ["packages", "file"])]
    pub top: Option<usize>,

    /// Directory the tarballs are written into.
    #[arg(short, long, default_value = "packages")]
    pub dest: PathBuf,

    /// Follow devDependencies.
    #[arg(long)]
    pub dev: bool,

    /// Follow peerDependencies.
    #[arg(long)]
    pub peer: bool,

    /// Follow optionalDependencies.
    #[arg(long)]
    pub optional: bool,

    /// Ignore the durable tarball cache and download everything.
    #[arg(long)]
    pub no_cache: bool,
}

impl Execute for Fetch {
    async fn execute(app: &Offpack, cmd: Self) -> anyhow::Result<()> {
        let root = if let Some(quantity) = cmd.top {
            RootSpec::Top(quantity)
        } else if let Some(file) = cmd.file {
            RootSpec::ManifestFile(file)
        } else if !cmd.packages.is_empty() {
            RootSpec::Specs(cmd.packages)
        } else {
            bail!("nothing to fetch: pass package specs, --file or --top")
        };
        let resolve = ResolveOptions {
            dev: cmd.dev,
            peer: cmd.peer,
            optional: cmd.optional,
        };
        let download = DownloadOptions {
            use_cache: !cmd.no_cache,
            dest: cmd.dest,
        };
        let report = app.fetch(root, resolve, download).await?;
        if report.downloaded == 0 && report.cached == 0 {
            println!("no packages fetched");
        } else {
            println!(
                "{} resolved, {} downloaded, {} already in cache, {} failed",
                report.resolved, report.downloaded, report.cached, report.failed
            );
        }
        Ok(())
    }
}
