use std::{
    path::{Component, Path},
    sync::atomic::{AtomicUsize, Ordering},
};

use sl_core::{
    do_jobs, err, info,
    json::{version::AssetIndexInfo, AssetIndex},
    mirrors::ArtifactKind,
    IntoIoError, IntoJsonError, ProgressReporter, RESOURCES_URL,
};

use super::{download::url_path, download::Artifact, ArtifactInstaller, InstallError};

impl ArtifactInstaller {
    pub(super) async fn download_assets(
        &self,
        index_info: &AssetIndexInfo,
        progress: &ProgressReporter,
    ) -> Result<(), InstallError> {
        info!("Downloading assets ({})", index_info.id);
        let assets_dir = self.assets_dir();
        let index_path = assets_dir
            .join("indexes")
            .join(format!("{}.json", index_info.id));

        self.fetch_verified(
            &Artifact {
                kind: ArtifactKind::Meta,
                url: &index_info.url,
                repo_path: url_path(&index_info.url),
                sha1: Some(&index_info.sha1),
            },
            &index_path,
        )
        .await?;

        let text = tokio::fs::read_to_string(&index_path)
            .await
            .path(&index_path)?;
        let index: AssetIndex = serde_json::from_str(&text).json(text)?;

        let objects_dir = assets_dir.join("objects");
        let total = index.objects.len();
        let done = AtomicUsize::new(0);
        let (objects_dir, done) = (&objects_dir, &done);

        _ = do_jobs(index.objects.values().map(|object| async move {
            let path = object.get_path();
            let url = format!("{RESOURCES_URL}/{path}");
            self.fetch_verified(
                &Artifact {
                    kind: ArtifactKind::Asset,
                    url: &url,
                    repo_path: &path,
                    sha1: Some(&object.hash),
                },
                &objects_dir.join(&path),
            )
            .await?;
            let n = done.fetch_add(1, Ordering::SeqCst) + 1;
            progress.progress(n, total, "Downloading assets");
            Ok::<(), InstallError>(())
        }))
        .await?;

        if index.is_virtual {
            let dir = assets_dir.join("virtual").join(&index_info.id);
            lay_out_by_name(&index, objects_dir, &dir).await?;
        }
        if index.map_to_resources {
            let dir = self.data_dir().join("resources");
            lay_out_by_name(&index, objects_dir, &dir).await?;
        }
        Ok(())
    }
}

/// Copies every object to `dest/<name>`, for versions that
/// read assets by their original file names.
async fn lay_out_by_name(
    index: &AssetIndex,
    objects_dir: &Path,
    dest: &Path,
) -> Result<(), InstallError> {
    for (name, object) in &index.objects {
        if !is_plain_relative(name) {
            err!("Skipping asset with suspicious name {name:?}");
            continue;
        }
        let to = dest.join(name);
        if sl_core::file_utils::exists(&to).await {
            continue;
        }
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await.path(parent)?;
        }
        let from = objects_dir.join(object.get_path());
        tokio::fs::copy(&from, &to).await.path(&to)?;
    }
    Ok(())
}

fn is_plain_relative(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|n| matches!(n, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::is_plain_relative;

    #[test]
    fn asset_names_cant_escape() {
        assert!(is_plain_relative("minecraft/sounds/ambient/cave/cave1.ogg"));
        assert!(!is_plain_relative("../../evil"));
        assert!(!is_plain_relative("/etc/passwd"));
        assert!(!is_plain_relative(""));
    }
}
