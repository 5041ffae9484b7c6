use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

/// Mojang's runtime index: platform, then component
/// (`java-runtime-gamma`, `jre-legacy`, ...), then builds.
#[derive(Deserialize, Debug, Default)]
#[serde(transparent)]
pub struct JavaListJson(HashMap<String, HashMap<String, Vec<JavaInstallListing>>>);

impl JavaListJson {
    /// The files manifest of the newest build of `component`.
    #[must_use]
    pub fn manifest_url(&self, platform: &str, component: &str) -> Option<&str> {
        let listing = self.0.get(platform)?.get(component)?.first()?;
        Some(&listing.manifest.url)
    }
}

#[derive(Deserialize, Debug)]
pub struct JavaInstallListing {
    manifest: JavaInstallListingManifest,
}

#[derive(Deserialize, Debug)]
pub struct JavaInstallListingManifest {
    url: String,
}

/// Every file of one runtime build, by path
/// relative to the install folder.
#[derive(Deserialize, Debug)]
pub struct JavaFilesJson {
    pub files: BTreeMap<String, JavaFile>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JavaFile {
    File {
        downloads: JavaFileDownload,
        #[serde(default)]
        executable: bool,
    },
    Directory,
    Link {
        target: String,
    },
}

impl JavaFile {
    #[must_use]
    pub fn get_kind_name(&self) -> &'static str {
        match self {
            JavaFile::File { .. } => "file",
            JavaFile::Directory => "dir",
            JavaFile::Link { .. } => "symlink",
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct JavaFileDownload {
    pub lzma: Option<JavaFileDownloadDetails>,
    pub raw: JavaFileDownloadDetails,
}

#[derive(Deserialize, Debug)]
pub struct JavaFileDownloadDetails {
    pub sha1: String,
    pub url: String,
}
