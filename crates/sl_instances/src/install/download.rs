use std::path::Path;

use owo_colors::OwoColorize;
use sl_core::{
    file_utils::{self, temp_sibling},
    mirrors::ArtifactKind,
    pt, retry, DownloadFileError, MirrorSource,
};

use super::{ArtifactInstaller, InstallError};

/// One file to fetch.
pub(super) struct Artifact<'a> {
    pub kind: ArtifactKind,
    /// The vendor url.
    pub url: &'a str,
    /// Path relative to the repository root, for mirror templates.
    pub repo_path: &'a str,
    pub sha1: Option<&'a str>,
}

/// The part of `url` after the host:
/// `https://piston-meta.mojang.com/v1/packages/x.json` -> `v1/packages/x.json`
pub(super) fn url_path(url: &str) -> &str {
    let url = url
        .strip_prefix("https://")
        .or(url.strip_prefix("http://"))
        .unwrap_or(url);
    url.find('/').map_or("", |pos| &url[pos + 1..])
}

impl ArtifactInstaller {
    /// Downloads `artifact` into `dest` unless a good copy is already there.
    ///
    /// Mirrors are tried in order. Network errors are retried a few
    /// times on the same mirror, a checksum mismatch moves on to the
    /// next mirror, and a disk error stops everything. Nothing reaches
    /// `dest` before it has been verified.
    pub(super) async fn fetch_verified(
        &self,
        artifact: &Artifact<'_>,
        dest: &Path,
    ) -> Result<(), InstallError> {
        if self.is_present(dest, artifact.sha1).await? {
            return Ok(());
        }

        let official = [MirrorSource::new("Official", "{url}")];
        let mirrors = match self.mirrors.for_kind(artifact.kind) {
            [] => &official[..],
            n => n,
        };

        let mut last_error = None;
        for mirror in mirrors {
            let url = mirror.render(artifact.url, artifact.repo_path, "");
            let temp = temp_sibling(dest);

            match retry(|| self.transport.download_to_path(&url, &temp)).await {
                Ok(()) => {}
                Err(DownloadFileError::Io(error)) => {
                    _ = tokio::fs::remove_file(&temp).await;
                    return Err(InstallError::Disk(error));
                }
                Err(DownloadFileError::Request(error)) => {
                    pt!("{} {} ({})", "Mirror failed:".yellow(), mirror.name, error.summary());
                    last_error = Some(InstallError::Download { url, error });
                    continue;
                }
            }

            if let Some(expected) = artifact.sha1 {
                let actual = file_utils::sha1_file(&temp).await?;
                if !actual.eq_ignore_ascii_case(expected) {
                    _ = tokio::fs::remove_file(&temp).await;
                    pt!("{} {url}", "Checksum mismatch:".yellow());
                    last_error = Some(InstallError::ChecksumMismatch {
                        url,
                        expected: expected.to_owned(),
                        actual,
                    });
                    continue;
                }
            }

            file_utils::rename_into_place(&temp, dest).await?;
            return Ok(());
        }

        Err(last_error.unwrap_or_else(|| InstallError::NoMirrors(artifact.url.to_owned())))
    }

    async fn is_present(&self, dest: &Path, sha1: Option<&str>) -> Result<bool, InstallError> {
        if !file_utils::exists(dest).await {
            return Ok(false);
        }
        let Some(expected) = sha1 else {
            return Ok(true);
        };
        let actual = file_utils::sha1_file(dest).await?;
        Ok(actual.eq_ignore_ascii_case(expected))
    }
}
