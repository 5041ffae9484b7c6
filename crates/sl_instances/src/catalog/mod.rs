//! Listing game versions and resolving loader versions.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, LazyLock},
    time::SystemTime,
};

use owo_colors::OwoColorize;
use regex::Regex;
use serde::Deserialize;
use sl_core::{
    constants::*, err, info, json::Manifest, pt, transport, ErrorKind, HttpTransport,
    JsonDownloadError, LoaderType, RequestError,
};
use thiserror::Error;
use tokio::sync::RwLock;

mod forge_meta;

/// A downloadable game version, as listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub id: String,
    /// `release`, `snapshot`, `old_beta`, ...
    pub kind: String,
    pub release_time: String,
}

/// What a launch request resolved to.
///
/// Recomputed on every launch: loader builds move upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub requested_version: String,
    pub loader: LoaderType,
    /// The folder name under `versions/` to install and run.
    pub launch_version_id: String,
    pub is_legacy: bool,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("couldn't fetch the list of Minecraft versions:\n{0}")]
    Unavailable(JsonDownloadError),
    #[error("no {loader} build exists for Minecraft {mc_version}")]
    LoaderNotFound {
        loader: LoaderType,
        mc_version: String,
    },
    #[error("couldn't look up the latest {loader} version:\n{reason}")]
    Resolution { loader: LoaderType, reason: String },
    #[error(
        "OptiFine for {0} isn't installed.\nInstall it first: install-loader --loader optifine --mc-version {0}"
    )]
    NotInstalled(String),
}

impl CatalogError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::Unavailable(_) => ErrorKind::CatalogUnavailable,
            CatalogError::LoaderNotFound { .. } => ErrorKind::LoaderNotFound,
            CatalogError::Resolution { .. } => ErrorKind::LoaderResolutionError,
            CatalogError::NotInstalled(_) => ErrorKind::LoaderNotInstalled,
        }
    }
}

/// Whether `mc_version` predates 1.7.5.
///
/// Versions are read as `major.minor[.patch]` (missing
/// patch is 0). Anything that doesn't start like that
/// (snapshots, betas) is not legacy.
#[must_use]
pub fn is_legacy(mc_version: &str) -> bool {
    static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(\d+)\.(\d+)\.?(\d+)?").expect("valid regex")
    });

    let Some(captures) = VERSION_REGEX.captures(mc_version) else {
        return false;
    };
    let part = |i: usize| -> Option<u32> {
        captures.get(i).map_or(Some(0), |n| n.as_str().parse().ok())
    };
    let (Some(major), Some(minor), Some(patch)) = (part(1), part(2), part(3)) else {
        return false;
    };
    major == 1 && (minor < 7 || (minor == 7 && patch < 5))
}

#[derive(Deserialize)]
struct FabricLoaderEntry {
    version: String,
    #[serde(default)]
    stable: bool,
}

#[derive(Deserialize)]
struct QuiltLoaderEntry {
    loader: QuiltLoaderVersion,
}

#[derive(Deserialize)]
struct QuiltLoaderVersion {
    version: String,
}

#[derive(Deserialize)]
struct ProfileId {
    id: String,
}

/// Queries (and caches) version metadata.
///
/// The Mojang manifest is fetched once per catalog and
/// kept; loader lookups always go to the network.
pub struct VersionCatalog {
    transport: Arc<dyn HttpTransport>,
    data_dir: PathBuf,
    manifest: RwLock<Option<Manifest>>,
}

impl VersionCatalog {
    pub fn new(transport: Arc<dyn HttpTransport>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            data_dir: data_dir.into(),
            manifest: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn versions_dir(&self) -> PathBuf {
        self.data_dir.join("versions")
    }

    /// The Mojang version manifest (cached after the first fetch).
    pub async fn manifest(&self) -> Result<Manifest, CatalogError> {
        if let Some(manifest) = self.manifest.read().await.clone() {
            return Ok(manifest);
        }
        let manifest = Manifest::download(self.transport.as_ref())
            .await
            .map_err(CatalogError::Unavailable)?;
        *self.manifest.write().await = Some(manifest.clone());
        Ok(manifest)
    }

    /// Lists downloadable versions, newest first.
    ///
    /// # Errors
    /// [`CatalogError::Unavailable`] if the manifest can't be fetched.
    pub async fn list_versions(
        &self,
        include_snapshots: bool,
    ) -> Result<Vec<VersionInfo>, CatalogError> {
        let manifest = self.manifest().await?;
        Ok(manifest
            .versions
            .iter()
            .filter(|n| include_snapshots || n.is_release())
            .map(|n| VersionInfo {
                id: n.id.clone(),
                kind: n.r#type.clone(),
                release_time: n.releaseTime.clone(),
            })
            .collect())
    }

    /// Works out which `versions/` folder a launch of
    /// `mc_version` with `loader` should use.
    pub async fn resolve_loader_version(
        &self,
        mc_version: &str,
        loader: LoaderType,
    ) -> Result<ResolvedVersion, CatalogError> {
        let launch_version_id = match loader {
            LoaderType::Vanilla => mc_version.to_owned(),
            LoaderType::Forge => {
                let build = self.latest_forge_build(mc_version).await?;
                forge_launch_id(mc_version, &build)
            }
            LoaderType::Fabric => {
                let loader_version = self.latest_fabric_loader().await?;
                fabric_launch_id(&loader_version, mc_version)
            }
            LoaderType::Quilt => {
                let loader_version = self.latest_quilt_loader(mc_version).await?;
                self.quilt_profile_id(mc_version, &loader_version).await?
            }
            LoaderType::OptiFine => self.find_installed_optifine(mc_version).await?,
        };
        pt!("{}: {launch_version_id}", "Launch version".underline());

        Ok(ResolvedVersion {
            requested_version: mc_version.to_owned(),
            loader,
            launch_version_id,
            is_legacy: is_legacy(mc_version),
        })
    }

    /// The newest Forge build for `mc_version`, in
    /// maven form (for example `1.20.1-47.2.0`).
    pub async fn latest_forge_build(&self, mc_version: &str) -> Result<String, CatalogError> {
        let response = self
            .transport
            .get(FORGE_METADATA_URL)
            .await
            .and_then(|n| n.error_for_status())
            .map_err(|err| resolution(LoaderType::Forge, &err))?;

        let metadata = forge_meta::MavenMetadata::parse(&response.text()).map_err(|err| {
            CatalogError::Resolution {
                loader: LoaderType::Forge,
                reason: err.to_string(),
            }
        })?;

        metadata
            .find_for_minecraft(mc_version)
            .map(str::to_owned)
            .ok_or_else(|| CatalogError::LoaderNotFound {
                loader: LoaderType::Forge,
                mc_version: mc_version.to_owned(),
            })
    }

    /// The newest stable Fabric loader.
    pub async fn latest_fabric_loader(&self) -> Result<String, CatalogError> {
        let url = format!("{FABRIC_META_URL}/versions/loader");
        let entries: Vec<FabricLoaderEntry> = transport::get_json(self.transport.as_ref(), &url)
            .await
            .map_err(|err| CatalogError::Resolution {
                loader: LoaderType::Fabric,
                reason: err.to_string(),
            })?;

        entries
            .iter()
            .find(|n| n.stable)
            .or(entries.first())
            .map(|n| n.version.clone())
            .ok_or_else(|| CatalogError::Resolution {
                loader: LoaderType::Fabric,
                reason: "the loader list is empty".to_owned(),
            })
    }

    /// The newest Quilt loader that supports `mc_version`.
    pub async fn latest_quilt_loader(&self, mc_version: &str) -> Result<String, CatalogError> {
        let url = format!("{QUILT_META_URL}/versions/loader/{mc_version}");
        let response = self
            .transport
            .get(&url)
            .await
            .map_err(|err| resolution(LoaderType::Quilt, &err))?;

        let not_found = || CatalogError::LoaderNotFound {
            loader: LoaderType::Quilt,
            mc_version: mc_version.to_owned(),
        };
        // Quilt answers unknown game versions with 400/404
        if matches!(response.status, 400 | 404) {
            return Err(not_found());
        }
        let response = response
            .error_for_status()
            .map_err(|err| resolution(LoaderType::Quilt, &err))?;

        let entries: Vec<QuiltLoaderEntry> =
            serde_json::from_slice(&response.body).map_err(|err| CatalogError::Resolution {
                loader: LoaderType::Quilt,
                reason: err.to_string(),
            })?;
        entries
            .into_iter()
            .next()
            .map(|n| n.loader.version)
            .ok_or_else(not_found)
    }

    /// The version id Quilt's launcher profile declares.
    pub async fn quilt_profile_id(
        &self,
        mc_version: &str,
        loader_version: &str,
    ) -> Result<String, CatalogError> {
        let url = quilt_profile_url(mc_version, loader_version);
        let profile: ProfileId = transport::get_json(self.transport.as_ref(), &url)
            .await
            .map_err(|err| CatalogError::Resolution {
                loader: LoaderType::Quilt,
                reason: err.to_string(),
            })?;
        Ok(profile.id)
    }

    /// Looks for an installed OptiFine profile for `mc_version`,
    /// picking the most recently modified one.
    pub async fn find_installed_optifine(&self, mc_version: &str) -> Result<String, CatalogError> {
        let versions_dir = self.versions_dir();
        find_newest_dir(&versions_dir, |name| {
            name.contains(mc_version) && name.contains("OptiFine")
        })
        .await
        .ok_or_else(|| CatalogError::NotInstalled(mc_version.to_owned()))
    }
}

fn resolution(loader: LoaderType, err: &RequestError) -> CatalogError {
    CatalogError::Resolution {
        loader,
        reason: err.summary(),
    }
}

/// `1.20.1-47.2.0` -> `1.20.1-forge-47.2.0`
#[must_use]
pub fn forge_launch_id(mc_version: &str, build: &str) -> String {
    let suffix = build.rsplit('-').next().unwrap_or(build);
    format!("{mc_version}-forge-{suffix}")
}

#[must_use]
pub fn fabric_launch_id(loader_version: &str, mc_version: &str) -> String {
    format!("fabric-loader-{loader_version}-{mc_version}")
}

#[must_use]
pub fn fabric_profile_url(mc_version: &str, loader_version: &str) -> String {
    format!("{FABRIC_META_URL}/versions/loader/{mc_version}/{loader_version}/profile/json")
}

#[must_use]
pub fn quilt_profile_url(mc_version: &str, loader_version: &str) -> String {
    format!("{QUILT_META_URL}/versions/loader/{mc_version}/{loader_version}/profile/json")
}

async fn find_newest_dir(parent: &Path, matches: impl Fn(&str) -> bool) -> Option<String> {
    let mut entries = match tokio::fs::read_dir(parent).await {
        Ok(n) => n,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                err!("Couldn't read {parent:?}: {error}");
            }
            return None;
        }
    };

    let mut newest: Option<(SystemTime, String)> = None;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_dir() || !matches(&name) {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().is_none_or(|(time, _)| modified > *time) {
            newest = Some((modified, name));
        }
    }
    if let Some((_, name)) = &newest {
        info!("Found installed profile: {name}");
    }
    newest.map(|(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sl_core::ScriptedTransport;

    const FORGE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>net.minecraftforge</groupId>
  <artifactId>forge</artifactId>
  <versioning>
    <latest>1.21-51.0.33</latest>
    <release>1.21-51.0.33</release>
    <versions>
      <version>1.21-51.0.33</version>
      <version>1.20.1-47.2.0</version>
      <version>1.20.1-47.1.0</version>
      <version>1.12.2-14.23.5.2859</version>
    </versions>
  </versioning>
</metadata>"#;

    fn catalog(transport: Arc<ScriptedTransport>) -> (tempfile::TempDir, VersionCatalog) {
        let dir = tempfile::tempdir().unwrap();
        let catalog = VersionCatalog::new(transport, dir.path());
        (dir, catalog)
    }

    #[test]
    fn legacy_cutoff_is_1_7_5() {
        assert!(is_legacy("1.6.4"));
        assert!(is_legacy("1.7.4"));
        assert!(is_legacy("1.7"));
        assert!(is_legacy("1.5.2"));
        assert!(!is_legacy("1.7.5"));
        assert!(!is_legacy("1.7.10"));
        assert!(!is_legacy("1.12.2"));
        assert!(!is_legacy("1.20.1"));
        assert!(!is_legacy("23w31a"));
        assert!(!is_legacy("b1.7.3"));
    }

    #[tokio::test]
    async fn forge_picks_newest_matching_build() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.ok(FORGE_METADATA_URL, FORGE_XML);
        let (_dir, catalog) = catalog(transport);

        let resolved = catalog
            .resolve_loader_version("1.20.1", LoaderType::Forge)
            .await
            .unwrap();
        assert_eq!(resolved.launch_version_id, "1.20.1-forge-47.2.0");
        assert!(!resolved.is_legacy);

        let missing = catalog
            .resolve_loader_version("1.19.4", LoaderType::Forge)
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::LoaderNotFound);
    }

    #[tokio::test]
    async fn fabric_uses_first_stable_loader() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.ok(
            &format!("{FABRIC_META_URL}/versions/loader"),
            r#"[{"version":"0.16.0-beta.1","stable":false},{"version":"0.15.11","stable":true}]"#,
        );
        let (_dir, catalog) = catalog(transport);

        let resolved = catalog
            .resolve_loader_version("1.20.1", LoaderType::Fabric)
            .await
            .unwrap();
        assert_eq!(resolved.launch_version_id, "fabric-loader-0.15.11-1.20.1");
    }

    #[tokio::test]
    async fn fabric_metadata_failure_is_a_resolution_error() {
        let transport = Arc::new(ScriptedTransport::new());
        let (_dir, catalog) = catalog(transport);
        let error = catalog
            .resolve_loader_version("1.20.1", LoaderType::Fabric)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::LoaderResolutionError);
    }

    #[tokio::test]
    async fn quilt_uses_profile_id() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.ok(
            &format!("{QUILT_META_URL}/versions/loader/1.20.1"),
            r#"[{"loader":{"version":"0.26.0"}},{"loader":{"version":"0.25.0"}}]"#,
        );
        transport.ok(
            &quilt_profile_url("1.20.1", "0.26.0"),
            r#"{"id":"quilt-loader-0.26.0-1.20.1","inheritsFrom":"1.20.1"}"#,
        );
        let (_dir, catalog) = catalog(transport.clone());

        let resolved = catalog
            .resolve_loader_version("1.20.1", LoaderType::Quilt)
            .await
            .unwrap();
        assert_eq!(resolved.launch_version_id, "quilt-loader-0.26.0-1.20.1");

        transport.ok(&format!("{QUILT_META_URL}/versions/loader/1.0"), "[]");
        let error = catalog
            .resolve_loader_version("1.0", LoaderType::Quilt)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::LoaderNotFound);
        let error = catalog
            .resolve_loader_version("0.0.1", LoaderType::Quilt)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::LoaderNotFound);
    }

    #[tokio::test]
    async fn optifine_requires_local_profile() {
        let transport = Arc::new(ScriptedTransport::new());
        let (dir, catalog) = catalog(transport.clone());

        let error = catalog
            .resolve_loader_version("1.20.1", LoaderType::OptiFine)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::LoaderNotInstalled);

        std::fs::create_dir_all(dir.path().join("versions/1.20.1-OptiFine_HD_U_I6")).unwrap();
        std::fs::create_dir_all(dir.path().join("versions/1.19.2-OptiFine_HD_U_I1")).unwrap();
        let resolved = catalog
            .resolve_loader_version("1.20.1", LoaderType::OptiFine)
            .await
            .unwrap();
        assert_eq!(resolved.launch_version_id, "1.20.1-OptiFine_HD_U_I6");
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn manifest_is_fetched_once() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.ok(
            VERSION_MANIFEST_URL,
            r#"{"latest":{"release":"1.20.1","snapshot":"23w31a"},"versions":[
                {"id":"23w31a","type":"snapshot","url":"u","time":"t","releaseTime":"t"},
                {"id":"1.20.1","type":"release","url":"u","time":"t","releaseTime":"t"}]}"#,
        );
        let (_dir, catalog) = catalog(transport.clone());

        let releases = catalog.list_versions(false).await.unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].id, "1.20.1");
        let all = catalog.list_versions(true).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn unreachable_manifest_is_catalog_unavailable() {
        let (_dir, catalog) = catalog(Arc::new(ScriptedTransport::new()));
        let error = catalog.list_versions(false).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::CatalogUnavailable);
    }

    #[test]
    fn forge_ids_use_the_build_suffix() {
        assert_eq!(forge_launch_id("1.20.1", "1.20.1-47.2.0"), "1.20.1-forge-47.2.0");
    }
}
