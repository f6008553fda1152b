pub mod cache;
pub mod cmd;
pub mod coerce;
pub mod download;
pub mod http;
pub mod name;
pub mod path;
pub mod pbar;
pub mod pipeline;
pub mod prelude;
pub mod progress;
pub mod registry;
pub mod resolve;
pub mod seed;
pub mod top;
pub mod visited;

use std::{ops::Deref, path::PathBuf, sync::Arc};

use clap::Parser;
use url::Url;

pub use prelude::*;

use crate::{
    cache::TarballCache,
    cmd::Execute,
    path::offpack_cache_dir,
    registry::{DEFAULT_REGISTRY, RegistryClient},
    visited::VisitedSet,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct OffpackInner {
    pub args: OffpackConfig,
    pub(crate) registry: RegistryClient,
    pub(crate) cache: TarballCache,
    pub(crate) visited: VisitedSet,
}

#[derive(Clone)]
pub struct Offpack(Arc<OffpackInner>);

impl Deref for Offpack {
    type Target = OffpackInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Offpack {
    pub async fn new(args: OffpackConfig) -> anyhow::Result<Self> {
        let cache_dir = match &args.cache_dir {
            Some(dir) => dir.clone(),
            None => offpack_cache_dir()?,
        };
        let cache = TarballCache::open(cache_dir.join("tarballs.db")).await?;
        let registry = RegistryClient::new(args.registry.clone());
        let val = OffpackInner {
            args,
            registry,
            cache,
            visited: VisitedSet::new(),
        };
        Ok(Self(Arc::new(val)))
    }

    pub async fn execute(&self, cmd: impl Execute) -> anyhow::Result<()> {
        Execute::execute(self, cmd).await
    }

    /// Flush the durable state before exit.
    pub async fn close(&self) {
        self.cache.close().await
    }
}

#[derive(Clone, Debug, Parser)]
#[command(version)]
pub struct OffpackConfig {
    /// Base URL of the source registry.
    #[arg(short, long, default_value = DEFAULT_REGISTRY)]
    pub registry: Url,

    /// Rewrite the directory holding the durable tarball cache.
    ///
    /// If not specified, the platform cache directory is used.
    #[arg(name = "cache-dir", long)]
    pub cache_dir: Option<PathBuf>,
}
