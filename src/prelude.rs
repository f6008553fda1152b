pub use super::cache::TarballCache;
pub use super::download::{DownloadOptions, DownloadReport, Downloader};
pub use super::name::PackageName;
pub use super::pipeline::{FetchReport, RootSpec};
pub use super::registry::{Manifest, Packument, RegistryClient};
pub use super::resolve::{ResolveOptions, Resolved, Resolver};
pub use super::visited::VisitedSet;
