use std::{
    fmt::Display,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
    sync::Semaphore,
    task::JoinSet,
};
use tracing::{Instrument, Span, debug, info, instrument, warn};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::{
    cache::TarballCache, pbar::PROGRESS_STYLE_DOWNLOAD, progress::ProgressSink,
    registry::RegistryClient, resolve::Resolved,
};

/// Concurrent tarball fetches per batch. The publish side documents the
/// same default.
pub const DOWNLOAD_CONCURRENCY: usize = 20;

#[derive(Clone, Debug)]
pub struct DownloadOptions {
    /// Consult and update the durable tarball cache.
    pub use_cache: bool,
    /// Directory the tarballs are written into.
    pub dest: PathBuf,
}

/// A package that could not be downloaded.
#[derive(Debug)]
pub struct DownloadError {
    pub pack: Resolved,
    pub source: anyhow::Error,
}

impl Display for DownloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "downloading {}: {}", self.pack, self.source)
    }
}

impl std::error::Error for DownloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

/// Outcome of one download batch.
pub struct DownloadReport {
    /// Per-package outcome, in settlement order.
    pub results: Vec<Result<Resolved, DownloadError>>,
    /// Packages skipped because the cache already had them.
    pub cached: usize,
}

impl DownloadReport {
    pub fn fulfilled(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn rejected(&self) -> usize {
        self.results.len() - self.fulfilled()
    }
}

/// Writes resolved packages into the destination directory.
#[derive(Clone)]
pub struct Downloader {
    registry: RegistryClient,
    cache: TarballCache,
}

impl Downloader {
    pub fn new(registry: RegistryClient, cache: TarballCache) -> Self {
        Self { registry, cache }
    }

    /// Download every package, honoring the cache partition.
    ///
    /// Individual failures are reported per element; the batch always
    /// runs to completion. The sink advances once per settlement.
    pub async fn run(
        &self,
        packs: Vec<Resolved>,
        opts: &DownloadOptions,
        sink: &dyn ProgressSink,
    ) -> anyhow::Result<DownloadReport> {
        let (queue, cached) = self.partition(packs, opts.use_cache).await?;
        let total = queue.len();
        if total == 0 {
            sink.advance(1.0);
            return Ok(DownloadReport {
                results: Vec::new(),
                cached,
            });
        }
        info!("downloading {total} tarballs, {cached} already cached");
        let semaphore = Arc::new(Semaphore::new(DOWNLOAD_CONCURRENCY));
        let mut set = JoinSet::new();
        for pack in queue {
            let this = self.clone();
            let semaphore = semaphore.clone();
            let use_cache = opts.use_cache;
            let dest = opts.dest.clone();
            let fut = async move {
                let _permit = semaphore.acquire_owned().await.unwrap();
                match this.fetch(&pack, &dest, use_cache).await {
                    Ok(()) => Ok(pack),
                    Err(source) => Err(DownloadError { pack, source }),
                }
            };
            set.spawn(fut.in_current_span());
        }
        let mut results = Vec::with_capacity(total);
        while let Some(res) = set.join_next().await {
            match res {
                Ok(outcome) => {
                    if let Err(err) = &outcome {
                        warn!("{err}");
                    }
                    results.push(outcome);
                }
                Err(err) => warn!("download task failed: {err}"),
            }
            sink.advance(results.len() as f64 / total as f64);
        }
        Ok(DownloadReport { results, cached })
    }

    /// Split the batch into pending work and already-cached entries.
    async fn partition(
        &self,
        packs: Vec<Resolved>,
        use_cache: bool,
    ) -> anyhow::Result<(Vec<Resolved>, usize)> {
        if !use_cache {
            return Ok((packs, 0));
        }
        let mut queue = Vec::with_capacity(packs.len());
        let mut cached = 0;
        for pack in packs {
            if self.cache.exists(&pack.name, &pack.version).await? {
                debug!("{pack} already in cache");
                cached += 1;
            } else {
                queue.push(pack);
            }
        }
        Ok((queue, cached))
    }

    /// Stream one tarball to disk, then record it in the cache.
    #[instrument(skip_all, fields(pack = %pack))]
    async fn fetch(&self, pack: &Resolved, dest: &Path, use_cache: bool) -> anyhow::Result<()> {
        let path = dest.join(pack.file_name());
        let mut res = self.registry.tarball(&pack.name, &pack.version).await?;

        let span = Span::current();
        let trunc: String = pack.name.chars().take(24).collect();
        span.pb_set_message(&trunc);
        span.pb_set_style(&PROGRESS_STYLE_DOWNLOAD);
        span.pb_set_length(res.content_length().unwrap_or(0));

        let mut writer = BufWriter::new(File::create(&path).await?);
        while let Some(chunk) = res.chunk().await? {
            writer.write_all(&chunk).await?;
            span.pb_inc(chunk.len() as u64);
        }
        writer.flush().await?;

        if use_cache {
            self.cache.add(&pack.name, &pack.version).await?;
        }
        debug!("wrote {}", path.display());
        Ok(())
    }
}
