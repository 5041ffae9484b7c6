use std::sync::Arc;

use serde_json::json;
use sl_core::{
    ErrorKind, JAVA_RUNTIME_LIST_URL, ProgressReporter, ScriptedTransport, file_utils::sha1_hex,
    json::version::JavaVersionJson,
};

use super::*;

const FILES_URL: &str = "https://piston-meta.test/v1/packages/gamma/manifest.json";
const JAVA_URL: &str = "https://piston-data.test/v1/objects/java";
const RELEASE_URL: &str = "https://piston-data.test/v1/objects/release";

fn java(component: &str, major: usize) -> JavaVersionJson {
    JavaVersionJson {
        component: component.to_owned(),
        majorVersion: major,
    }
}

/// Lists `java-runtime-gamma` for this platform with
/// a `bin/java` and a `release` file.
fn script_runtime(transport: &ScriptedTransport, platform: &str, java_bytes: &[u8]) {
    transport.ok(
        JAVA_RUNTIME_LIST_URL,
        json!({
            (platform): {
                "java-runtime-gamma": [{ "manifest": { "url": FILES_URL } }],
                "jre-legacy": []
            }
        })
        .to_string(),
    );
    transport.ok(
        FILES_URL,
        json!({
            "files": {
                "bin": { "type": "directory" },
                (format!("bin/{JAVA_BIN}")): {
                    "type": "file",
                    "executable": true,
                    "downloads": { "raw": { "sha1": sha1_hex(b"java binary"), "url": JAVA_URL } }
                },
                "release": {
                    "type": "file",
                    "downloads": { "raw": { "sha1": sha1_hex(b"JAVA_VERSION=17"), "url": RELEASE_URL } }
                }
            }
        })
        .to_string(),
    );
    transport.ok(JAVA_URL, java_bytes.to_vec());
    transport.ok(RELEASE_URL, b"JAVA_VERSION=17".to_vec());
}

#[tokio::test]
async fn installs_the_listed_runtime_once() {
    let Some(platform) = platform_key() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new());
    script_runtime(&transport, platform, b"java binary");
    let installer = JavaInstaller::new(transport.clone(), dir.path());
    let gamma = java("java-runtime-gamma", 17);

    assert!(installer.find(&gamma).await.is_none());
    let bin = installer
        .ensure(&gamma, &ProgressReporter::silent())
        .await
        .unwrap();

    let install_dir = dir.path().join("runtime/java-runtime-gamma");
    assert_eq!(bin, install_dir.join("bin").join(JAVA_BIN));
    assert_eq!(std::fs::read(&bin).unwrap(), b"java binary");
    assert!(install_dir.join("release").is_file());
    assert!(!install_dir.join(LOCK_FILE).exists());
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&bin).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    let requests = transport.request_count();
    installer
        .ensure(&gamma, &ProgressReporter::silent())
        .await
        .unwrap();
    assert_eq!(transport.request_count(), requests);
}

#[tokio::test]
async fn unknown_component_falls_back_to_the_major_version() {
    let Some(platform) = platform_key() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new());
    script_runtime(&transport, platform, b"java binary");
    let installer = JavaInstaller::new(transport, dir.path());

    let bin = installer
        .ensure(&java("java-runtime-new", 17), &ProgressReporter::silent())
        .await
        .unwrap();
    assert!(bin.starts_with(dir.path().join("runtime/java-runtime-new")));
}

#[tokio::test]
async fn unlisted_runtime_is_java_not_found() {
    let Some(platform) = platform_key() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new());
    script_runtime(&transport, platform, b"java binary");
    let installer = JavaInstaller::new(transport, dir.path());

    let error = installer
        .ensure(&java("jre-legacy", 8), &ProgressReporter::silent())
        .await
        .unwrap_err();
    assert!(matches!(error, JavaInstallError::RuntimeNotListed { .. }));
    assert_eq!(error.kind(), ErrorKind::JavaNotFound);
}

#[tokio::test]
async fn corrupt_download_leaves_the_install_unfinished() {
    let Some(platform) = platform_key() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(ScriptedTransport::new());
    script_runtime(&transport, platform, b"truncated");
    let installer = JavaInstaller::new(transport, dir.path());
    let gamma = java("java-runtime-gamma", 17);

    let error = installer
        .ensure(&gamma, &ProgressReporter::silent())
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ChecksumMismatch);
    assert!(dir
        .path()
        .join("runtime/java-runtime-gamma")
        .join(LOCK_FILE)
        .exists());
    assert!(installer.find(&gamma).await.is_none());
}

#[test]
fn file_names_cannot_leave_the_install_folder() {
    let base = Path::new("runtime/java-runtime-gamma");
    assert!(join_relative(base, "bin/java").is_ok());
    assert!(join_relative(base, "../../evil").is_err());
    assert!(join_relative(base, "/etc/passwd").is_err());
}

#[test]
fn major_versions_map_to_components() {
    assert_eq!(component_for_major(8), "jre-legacy");
    assert_eq!(component_for_major(17), "java-runtime-gamma");
    assert_eq!(component_for_major(21), "java-runtime-delta");
}
