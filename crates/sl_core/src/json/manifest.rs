use serde::Deserialize;

use crate::{transport, HttpTransport, JsonDownloadError, VERSION_MANIFEST_URL};

/// An official Minecraft version manifest
/// (list of all versions and their download links)
#[derive(Deserialize, Clone, Debug)]
pub struct Manifest {
    latest: Latest,
    pub versions: Vec<Version>,
}

impl Manifest {
    /// Downloads the manifest from Mojang.
    ///
    /// No caching happens here; callers that need it
    /// (the version catalog) keep their own copy.
    ///
    /// # Errors
    /// If the file cannot be downloaded or parsed into JSON.
    pub async fn download(transport: &dyn HttpTransport) -> Result<Manifest, JsonDownloadError> {
        transport::get_json(transport, VERSION_MANIFEST_URL).await
    }

    /// Looks up a version by its name.
    /// This searches for an *exact match*.
    #[must_use]
    pub fn find_name(&self, name: &str) -> Option<&Version> {
        self.versions.iter().find(|n| n.id == name)
    }

    /// Gets the latest stable release
    ///
    /// This only returns a `None` if the .latest field's
    /// data is *wrong* (impossible normally).
    #[must_use]
    pub fn get_latest_release(&self) -> Option<&Version> {
        self.find_name(&self.latest.release)
    }

    #[must_use]
    pub fn get_latest_snapshot(&self) -> Option<&Version> {
        self.find_name(&self.latest.snapshot)
    }

    /// Version ids in manifest order (newest first).
    /// Only `release` entries unless `include_snapshots`.
    #[must_use]
    pub fn version_ids(&self, include_snapshots: bool) -> Vec<String> {
        self.versions
            .iter()
            .filter(|n| include_snapshots || n.is_release())
            .map(|n| n.id.clone())
            .collect()
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct Latest {
    pub release: String,
    pub snapshot: String,
}

#[allow(non_snake_case)]
#[derive(Deserialize, Clone, Debug)]
pub struct Version {
    pub id: String,
    pub r#type: String,
    pub url: String,
    pub time: String,
    pub releaseTime: String,
    pub sha1: Option<String>,
}

impl Version {
    #[must_use]
    pub fn is_release(&self) -> bool {
        self.r#type == "release"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "latest": { "release": "1.20.1", "snapshot": "23w31a" },
        "versions": [
            { "id": "23w31a", "type": "snapshot", "url": "https://x/23w31a.json", "time": "t", "releaseTime": "t" },
            { "id": "1.20.1", "type": "release", "url": "https://x/1.20.1.json", "time": "t", "releaseTime": "t", "sha1": "ab" },
            { "id": "b1.7.3", "type": "old_beta", "url": "https://x/b1.7.3.json", "time": "t", "releaseTime": "t" },
            { "id": "1.7.10", "type": "release", "url": "https://x/1.7.10.json", "time": "t", "releaseTime": "t" }
        ]
    }"#;

    #[test]
    fn releases_only_by_default() {
        let manifest: Manifest = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(manifest.version_ids(false), ["1.20.1", "1.7.10"]);
        assert_eq!(
            manifest.version_ids(true),
            ["23w31a", "1.20.1", "b1.7.3", "1.7.10"]
        );
        assert_eq!(manifest.get_latest_release().unwrap().id, "1.20.1");
        assert_eq!(manifest.get_latest_snapshot().unwrap().id, "23w31a");
    }
}
