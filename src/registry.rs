use std::{collections::HashMap, fmt::Display, future::Future};

use indexmap::IndexMap;
use reqwest::{Client, Response, StatusCode};
use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{coerce::LATEST, http::HttpRequest, name::PackageName};

/// The public npm registry.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// Per-version package metadata, as served by the registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: Version,
    #[serde(default)]
    pub dependencies: IndexMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: IndexMap<String, String>,
    #[serde(default, rename = "peerDependencies")]
    pub peer_dependencies: IndexMap<String, String>,
    #[serde(default, rename = "optionalDependencies")]
    pub optional_dependencies: IndexMap<String, String>,
}

impl Manifest {
    /// Synthetic manifest acting as the root of a resolve pass.
    pub fn root(dependencies: IndexMap<String, String>) -> Self {
        Self {
            name: "root".into(),
            version: Version::new(0, 0, 0),
            dependencies,
            dev_dependencies: Default::default(),
            peer_dependencies: Default::default(),
            optional_dependencies: Default::default(),
        }
    }
}

/// Whole-package metadata: every published version plus dist-tags.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Packument {
    pub name: String,
    #[serde(default)]
    pub versions: IndexMap<String, serde_json::Value>,
    #[serde(default, rename = "dist-tags")]
    pub dist_tags: HashMap<String, String>,
    #[serde(default)]
    pub time: HashMap<String, String>,
}

impl Packument {
    /// The version the `latest` dist-tag points at.
    pub fn latest(&self) -> Option<&str> {
        self.dist_tags.get(LATEST).map(String::as_str)
    }
}

/// One page of the `-/v1/search` endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct SearchPage {
    pub objects: Vec<SearchHit>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchHit {
    pub package: SearchPackage,
}

/// The `(name, version)` seed carried by a search result.
#[derive(Clone, Debug, Deserialize)]
pub struct SearchPackage {
    pub name: PackageName,
    pub version: Version,
}

/// Error document the registry attaches to non-success responses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    #[serde(default, rename = "distTags")]
    dist_tags: HashMap<String, String>,
}

#[derive(Debug)]
pub enum RegistryError {
    /// The package does not exist at all (`E404`).
    NotFound { name: PackageName, query: String },
    /// The package exists but the queried version does not (`ETARGET`).
    /// Carries the dist-tags from the error document.
    TargetMissing {
        name: PackageName,
        query: String,
        dist_tags: HashMap<String, String>,
    },
    /// Any other non-success response.
    Status { name: PackageName, status: StatusCode },
    Http(reqwest::Error),
    Url(url::ParseError),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::NotFound { name, query } => {
                write!(f, "package {name} not found (queried {query})")
            }
            RegistryError::TargetMissing { name, query, .. } => {
                write!(f, "no version of {name} matching {query}")
            }
            RegistryError::Status { name, status } => {
                write!(f, "registry returned {status} for {name}")
            }
            RegistryError::Http(e) => write!(f, "{e}"),
            RegistryError::Url(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::Http(e) => Some(e),
            RegistryError::Url(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

impl From<url::ParseError> for RegistryError {
    fn from(value: url::ParseError) -> Self {
        Self::Url(value)
    }
}

/// Which query to retry with after a failed manifest fetch, if any.
///
/// A missing version retries with the `latest` dist-tag the registry
/// reported; a missing package retries once with the literal `latest` tag.
pub fn fallback_query(err: &RegistryError, original: &str) -> Option<String> {
    match err {
        RegistryError::TargetMissing { dist_tags, .. } => dist_tags.get(LATEST).cloned(),
        RegistryError::NotFound { .. } if original != LATEST => Some(LATEST.to_string()),
        _ => None,
    }
}

/// Read operations the resolver needs from a registry.
pub trait PackageRegistry: Clone + Send + Sync + 'static {
    /// Fetch the manifest for an exact version or tag, applying the
    /// fallback policy for missing targets.
    fn manifest(
        &self,
        name: &PackageName,
        version: &str,
    ) -> impl Future<Output = Result<Manifest, RegistryError>> + Send;

    /// Fetch the whole packument. No fallback.
    fn packument(
        &self,
        name: &PackageName,
    ) -> impl Future<Output = Result<Packument, RegistryError>> + Send;
}

/// HTTP client against one registry base URL. Cheap to clone.
#[derive(Clone)]
pub struct RegistryClient {
    base: Url,
    http: Client,
}

impl AsRef<Client> for RegistryClient {
    fn as_ref(&self) -> &Client {
        &self.http
    }
}

impl RegistryClient {
    pub fn new(mut base: Url) -> Self {
        // without a trailing slash Url::join drops the last path segment
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Self {
            base,
            http: Default::default(),
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Scoped names keep their slash escaped in document paths.
    fn escaped(name: &PackageName) -> String {
        name.as_str().replace('/', "%2F")
    }

    async fn get_checked(
        &self,
        name: &PackageName,
        query: &str,
        url: Url,
    ) -> Result<Response, RegistryError> {
        let res = self.http_get(url).await?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.json::<ErrorBody>().await.unwrap_or_default();
        Err(match body.code.as_deref() {
            Some("ETARGET") => RegistryError::TargetMissing {
                name: name.clone(),
                query: query.to_string(),
                dist_tags: body.dist_tags,
            },
            Some("E404") => RegistryError::NotFound {
                name: name.clone(),
                query: query.to_string(),
            },
            _ if status == StatusCode::NOT_FOUND => RegistryError::NotFound {
                name: name.clone(),
                query: query.to_string(),
            },
            _ => RegistryError::Status {
                name: name.clone(),
                status,
            },
        })
    }

    async fn manifest_exact(
        &self,
        name: &PackageName,
        version: &str,
    ) -> Result<Manifest, RegistryError> {
        let url = self
            .base
            .join(&format!("{}/{version}", Self::escaped(name)))?;
        let res = self.get_checked(name, version, url).await?;
        Ok(res.json().await?)
    }

    /// Fetch the manifest for one version or tag.
    ///
    /// A missing version is transparently retried with the `latest`
    /// dist-tag the registry reported, a missing package once with the
    /// literal `latest` tag; see [`fallback_query`].
    pub async fn manifest(
        &self,
        name: &PackageName,
        version: &str,
    ) -> Result<Manifest, RegistryError> {
        match self.manifest_exact(name, version).await {
            Ok(found) => Ok(found),
            Err(err) => match fallback_query(&err, version) {
                Some(retry) => {
                    debug!("retrying {name} with {retry}: {err}");
                    self.manifest_exact(name, &retry).await
                }
                None => Err(err),
            },
        }
    }

    pub async fn packument(&self, name: &PackageName) -> Result<Packument, RegistryError> {
        let url = self.base.join(&Self::escaped(name))?;
        let res = self.get_checked(name, name.as_str(), url).await?;
        Ok(res.json().await?)
    }

    /// Stream the tarball for an exact version.
    pub async fn tarball(
        &self,
        name: &PackageName,
        version: &Version,
    ) -> Result<Response, RegistryError> {
        let url = self.base.join(&format!(
            "{}/-/{}-{version}.tgz",
            name.as_str(),
            name.basename()
        ))?;
        self.get_checked(name, &version.to_string(), url).await
    }

    /// One page of the search endpoint, ranked by popularity.
    pub async fn search(&self, size: usize, from: usize) -> Result<SearchPage, RegistryError> {
        let mut url = self.base.join("-/v1/search")?;
        url.query_pairs_mut()
            .append_pair("text", "boost-exact:false")
            .append_pair("popularity", "1.0")
            .append_pair("size", &size.to_string())
            .append_pair("from", &from.to_string());
        let res = self.http_get(url).await?.error_for_status()?;
        Ok(res.json().await?)
    }
}

impl PackageRegistry for RegistryClient {
    async fn manifest(
        &self,
        name: &PackageName,
        version: &str,
    ) -> Result<Manifest, RegistryError> {
        RegistryClient::manifest(self, name, version).await
    }

    async fn packument(&self, name: &PackageName) -> Result<Packument, RegistryError> {
        RegistryClient::packument(self, name).await
    }
}
