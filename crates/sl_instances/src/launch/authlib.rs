use std::path::{Path, PathBuf};

use sl_core::{file_utils, info, retry, DownloadFileError, HttpTransport, AUTHLIB_INJECTOR_URL};

use super::command::authlib_path;

/// Makes sure `<dataDir>/authlib-injector.jar` exists.
pub async fn ensure_authlib(
    transport: &dyn HttpTransport,
    data_dir: &Path,
) -> Result<PathBuf, DownloadFileError> {
    let path = authlib_path(data_dir);
    if file_utils::exists(&path).await {
        return Ok(path);
    }
    info!("Downloading authlib-injector");
    retry(|| transport.download_to_path(AUTHLIB_INJECTOR_URL, &path)).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sl_core::ScriptedTransport;

    #[tokio::test]
    async fn downloads_once() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new();
        transport.ok(AUTHLIB_INJECTOR_URL, b"PK\x03\x04agent".to_vec());

        let path = ensure_authlib(&transport, dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("authlib-injector.jar"));
        ensure_authlib(&transport, dir.path()).await.unwrap();
        assert_eq!(transport.request_count(), 1);
    }
}
