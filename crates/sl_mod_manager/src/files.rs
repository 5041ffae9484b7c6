//! Mod, resource pack and shader pack files on disk.
//!
//! Mods live in `<dataDir>/mods/<mc>/`, with `<dataDir>/mods/`
//! itself holding mods shared by every version. Packs live in
//! `<dataDir>/resourcepacks/` and `<dataDir>/shaderpacks/`
//! and are either `.zip` files or plain folders.
//!
//! A modpack is a zip with the chosen mods under `mods/`,
//! packs under `resourcepacks/` and `shaderpacks/`,
//! and a `manifest.json` naming the game version.

use std::{
    io::Write,
    path::{Component, Path, PathBuf},
};

use serde::Serialize;
use sl_core::{ErrorKind, IntoIoError, IntoJsonError, IoError, JsonError, info};
use thiserror::Error;
use walkdir::WalkDir;
use zip::{ZipWriter, write::SimpleFileOptions};

const MOD_EXTENSIONS: &[&str] = &["jar", "zip"];

#[derive(Debug, Error)]
pub enum ModFileError {
    #[error("invalid file name: {0:?}")]
    InvalidName(String),
    #[error("{0:?} isn't installed for {1}")]
    NotFound(String, String),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Json(#[from] JsonError),
    #[error("couldn't write modpack:\n{0}")]
    Zip(#[from] zip::result::ZipError),
}

impl ModFileError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModFileError::InvalidName(_) | ModFileError::NotFound(..) => ErrorKind::InvalidRequest,
            ModFileError::Io(_) | ModFileError::Json(_) | ModFileError::Zip(_) => {
                ErrorKind::DiskWriteError
            }
        }
    }
}

/// What goes into a modpack, by file name.
#[derive(Debug, Clone, Default)]
pub struct ModpackContents {
    pub mods: Vec<String>,
    pub resource_packs: Vec<String>,
    pub shader_packs: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModpackManifest<'a> {
    minecraft: ManifestMinecraft<'a>,
    manifest_type: &'static str,
    manifest_version: u32,
    name: String,
    version: &'static str,
    author: &'static str,
    files: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestMinecraft<'a> {
    version: &'a str,
    mod_loaders: Vec<String>,
}

/// The launcher's mod and pack folders.
pub struct ModFiles {
    data_dir: PathBuf,
}

impl ModFiles {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    #[must_use]
    pub fn mods_dir(&self, mc_version: &str) -> PathBuf {
        self.data_dir.join("mods").join(mc_version)
    }

    /// Mods for `mc_version`, then shared ones
    /// not shadowed by a same-named version mod.
    pub async fn mods(&self, mc_version: &str) -> Result<Vec<String>, ModFileError> {
        let mut mods = list_dir(&self.mods_dir(mc_version), |name, is_dir| {
            !is_dir && has_mod_extension(name)
        })
        .await?;
        for shared in list_dir(&self.data_dir.join("mods"), |name, is_dir| {
            !is_dir && has_mod_extension(name)
        })
        .await?
        {
            if !mods.contains(&shared) {
                mods.push(shared);
            }
        }
        Ok(mods)
    }

    /// Copies a mod file into `mods/<mc>/`, replacing
    /// one with the same name. Returns where it went.
    pub async fn add_mod(&self, mc_version: &str, source: &Path) -> Result<PathBuf, ModFileError> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ModFileError::InvalidName(source.to_string_lossy().into_owned()))?;
        check_name(name)?;

        let dir = self.mods_dir(mc_version);
        tokio::fs::create_dir_all(&dir).await.dir(&dir)?;
        let dest = dir.join(name);
        tokio::fs::copy(source, &dest).await.path(source)?;
        info!("Added mod {name} for {mc_version}");
        Ok(dest)
    }

    /// Deletes a mod from `mods/<mc>/`, or from the
    /// shared folder if the version has no such mod.
    pub async fn remove_mod(&self, mc_version: &str, name: &str) -> Result<(), ModFileError> {
        check_name(name)?;
        for dir in [self.mods_dir(mc_version), self.data_dir.join("mods")] {
            let path = dir.join(name);
            if path.is_file() {
                tokio::fs::remove_file(&path).await.path(&path)?;
                info!("Removed mod {name}");
                return Ok(());
            }
        }
        Err(ModFileError::NotFound(name.to_owned(), mc_version.to_owned()))
    }

    pub async fn resource_packs(&self) -> Result<Vec<String>, ModFileError> {
        list_packs(&self.data_dir.join("resourcepacks")).await
    }

    pub async fn shader_packs(&self) -> Result<Vec<String>, ModFileError> {
        list_packs(&self.data_dir.join("shaderpacks")).await
    }

    /// Writes a modpack zip to `output`.
    ///
    /// Names that don't exist are skipped with a log line.
    /// Returns how many files went in, manifest excluded.
    pub async fn create_modpack(
        &self,
        mc_version: &str,
        contents: &ModpackContents,
        output: &Path,
    ) -> Result<usize, ModFileError> {
        let mut sources = Vec::new();
        for name in &contents.mods {
            check_name(name)?;
            let in_version = self.mods_dir(mc_version).join(name);
            let path = if in_version.is_file() {
                in_version
            } else {
                self.data_dir.join("mods").join(name)
            };
            sources.push(("mods", name.clone(), path));
        }
        for (folder, names) in [
            ("resourcepacks", &contents.resource_packs),
            ("shaderpacks", &contents.shader_packs),
        ] {
            for name in names {
                check_name(name)?;
                sources.push((folder, name.clone(), self.data_dir.join(folder).join(name)));
            }
        }

        let manifest = ModpackManifest {
            minecraft: ManifestMinecraft {
                version: mc_version,
                mod_loaders: Vec::new(),
            },
            manifest_type: "minecraftModpack",
            manifest_version: 1,
            name: format!("Modpack {mc_version}"),
            version: "1.0.0",
            author: "16Launcher",
            files: Vec::new(),
        };
        let manifest = serde_json::to_vec_pretty(&manifest).json_to()?;

        let output = output.to_owned();
        let written = tokio::task::spawn_blocking(move || write_modpack(&output, &sources, &manifest))
            .await
            .map_err(|n| IoError::Io {
                error: n.to_string(),
                path: PathBuf::new(),
            })??;
        info!("Created modpack with {written} files");
        Ok(written)
    }
}

fn write_modpack(
    output: &Path,
    sources: &[(&str, String, PathBuf)],
    manifest: &[u8],
) -> Result<usize, ModFileError> {
    let file = std::fs::File::create(output).path(output)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    let mut written = 0;

    for (folder, name, path) in sources {
        if path.is_dir() {
            for entry in WalkDir::new(path) {
                let entry = entry.map_err(|n| IoError::Io {
                    error: n.to_string(),
                    path: path.clone(),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(path) else {
                    continue;
                };
                let relative = relative.to_string_lossy().replace('\\', "/");
                add_file(&mut zip, &format!("{folder}/{name}/{relative}"), entry.path(), options)?;
                written += 1;
            }
        } else if path.is_file() {
            add_file(&mut zip, &format!("{folder}/{name}"), path, options)?;
            written += 1;
        } else {
            info!("Skipping missing {folder}/{name}");
        }
    }

    zip.start_file("manifest.json", options)?;
    zip.write_all(manifest).path(output)?;
    zip.finish()?;
    Ok(written)
}

fn add_file(
    zip: &mut ZipWriter<std::fs::File>,
    name: &str,
    path: &Path,
    options: SimpleFileOptions,
) -> Result<(), ModFileError> {
    let bytes = std::fs::read(path).path(path)?;
    zip.start_file(name, options)?;
    zip.write_all(&bytes).path(path)?;
    Ok(())
}

/// Sorted names in `dir` that pass `keep`.
/// A missing folder has nothing in it.
async fn list_dir(
    dir: &Path,
    keep: impl Fn(&str, bool) -> bool,
) -> Result<Vec<String>, ModFileError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(n) => n,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(error.dir(dir).into()),
    };
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.dir(dir)? {
        let is_dir = entry.file_type().await.path(entry.path())?.is_dir();
        if let Some(name) = entry.file_name().to_str() {
            if keep(name, is_dir) {
                names.push(name.to_owned());
            }
        }
    }
    names.sort();
    Ok(names)
}

async fn list_packs(dir: &Path) -> Result<Vec<String>, ModFileError> {
    list_dir(dir, |name, is_dir| is_dir || extension_is(name, "zip")).await
}

fn has_mod_extension(name: &str) -> bool {
    MOD_EXTENSIONS.iter().any(|n| extension_is(name, n))
}

fn extension_is(name: &str, extension: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|n| n.eq_ignore_ascii_case(extension))
}

/// A single plain file name, nothing that walks out of the folder.
fn check_name(name: &str) -> Result<(), ModFileError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ModFileError::InvalidName(name.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    fn touch(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn lists_version_mods_before_shared_ones() {
        let dir = tempfile::tempdir().unwrap();
        let mods = dir.path().join("mods");
        touch(&mods.join("1.20.1/sodium.jar"), "");
        touch(&mods.join("1.20.1/notes.txt"), "");
        touch(&mods.join("shared.zip"), "");
        touch(&mods.join("sodium.jar"), "");
        std::fs::create_dir_all(mods.join("1.19.4")).unwrap();

        let files = ModFiles::new(dir.path());
        assert_eq!(
            files.mods("1.20.1").await.unwrap(),
            ["sodium.jar", "shared.zip"]
        );
        assert_eq!(
            files.mods("1.18.2").await.unwrap(),
            ["shared.zip", "sodium.jar"]
        );
    }

    #[tokio::test]
    async fn added_mods_can_be_removed() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("downloads/lithium.jar");
        touch(&source, "lithium");
        let files = ModFiles::new(dir.path());

        let dest = files.add_mod("1.20.1", &source).await.unwrap();
        assert_eq!(dest, dir.path().join("mods/1.20.1/lithium.jar"));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "lithium");

        files.remove_mod("1.20.1", "lithium.jar").await.unwrap();
        assert!(!dest.exists());
        let error = files.remove_mod("1.20.1", "lithium.jar").await.unwrap_err();
        assert!(matches!(error, ModFileError::NotFound(..)));
    }

    #[tokio::test]
    async fn removing_falls_back_to_the_shared_folder() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("mods/shared.jar"), "");
        let files = ModFiles::new(dir.path());

        files.remove_mod("1.20.1", "shared.jar").await.unwrap();
        assert!(!dir.path().join("mods/shared.jar").exists());
    }

    #[tokio::test]
    async fn names_cannot_leave_the_mods_folder() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("settings.json"), "{}");
        let files = ModFiles::new(dir.path());

        let error = files
            .remove_mod("1.20.1", "../../settings.json")
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidRequest);
        assert!(dir.path().join("settings.json").exists());
    }

    #[tokio::test]
    async fn packs_are_zips_or_folders() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("resourcepacks/faithful.zip"), "");
        touch(&dir.path().join("resourcepacks/readme.txt"), "");
        touch(&dir.path().join("resourcepacks/custom/pack.mcmeta"), "{}");
        touch(&dir.path().join("shaderpacks/BSL.zip"), "");
        let files = ModFiles::new(dir.path());

        assert_eq!(
            files.resource_packs().await.unwrap(),
            ["custom", "faithful.zip"]
        );
        assert_eq!(files.shader_packs().await.unwrap(), ["BSL.zip"]);
        std::fs::remove_dir_all(dir.path().join("shaderpacks")).unwrap();
        assert!(files.shader_packs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn modpack_has_mods_packs_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("mods/1.20.1/sodium.jar"), "sodium");
        touch(&dir.path().join("mods/shared.jar"), "shared");
        touch(
            &dir.path().join("resourcepacks/custom/assets/a.png"),
            "png",
        );
        touch(&dir.path().join("shaderpacks/BSL.zip"), "bsl");
        let files = ModFiles::new(dir.path());
        let output = dir.path().join("pack.zip");

        let written = files
            .create_modpack(
                "1.20.1",
                &ModpackContents {
                    mods: vec!["sodium.jar".into(), "shared.jar".into(), "gone.jar".into()],
                    resource_packs: vec!["custom".into()],
                    shader_packs: vec!["BSL.zip".into()],
                },
                &output,
            )
            .await
            .unwrap();
        assert_eq!(written, 4);

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&output).unwrap()).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_owned).collect();
        names.sort();
        assert_eq!(
            names,
            [
                "manifest.json",
                "mods/shared.jar",
                "mods/sodium.jar",
                "resourcepacks/custom/assets/a.png",
                "shaderpacks/BSL.zip",
            ]
        );

        let mut manifest = String::new();
        archive
            .by_name("manifest.json")
            .unwrap()
            .read_to_string(&mut manifest)
            .unwrap();
        let manifest: serde_json::Value = serde_json::from_str(&manifest).unwrap();
        assert_eq!(manifest["minecraft"]["version"], "1.20.1");
        assert_eq!(manifest["manifestType"], "minecraftModpack");
        assert_eq!(manifest["author"], "16Launcher");
    }
}
