//! Download mirror lists.
//!
//! These are plain data: ordered lists of url templates that
//! the installers walk through until one yields a verified file.
//! The built-in defaults can be replaced by a `mirrors.json`
//! in the launcher directory.
//!
//! Templates may contain:
//! - `{url}`: the original (vendor) url
//! - `{path}`: the maven/asset path relative to the repository root
//! - `{version}`: a loader build id (Forge mirrors)

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{err, IntoIoError, IntoJsonError, JsonFileError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSource {
    pub name: String,
    pub url_template: String,
}

impl MirrorSource {
    #[must_use]
    pub fn new(name: &str, url_template: &str) -> Self {
        Self {
            name: name.to_owned(),
            url_template: url_template.to_owned(),
        }
    }

    /// Fills in the template placeholders.
    #[must_use]
    pub fn render(&self, url: &str, path: &str, version: &str) -> String {
        self.url_template
            .replace("{url}", url)
            .replace("{path}", path)
            .replace("{version}", version)
    }
}

/// What kind of file is being fetched; each kind
/// has its own mirror list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Library,
    Asset,
    /// Client jars, version JSONs and asset indexes.
    Meta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeMirrors {
    pub installers: Vec<MirrorSource>,
    /// Redirects to any host containing one of these are skipped.
    pub blocked_domains: Vec<String>,
    /// Last resort, tried once with the primary url url-encoded into `{url}`.
    pub cors_proxy: Option<String>,
    /// Redirect hops followed per mirror before giving up on it.
    pub max_redirects: usize,
}

impl Default for ForgeMirrors {
    fn default() -> Self {
        const FORGE_PATH: &str =
            "net/minecraftforge/forge/{version}/forge-{version}-installer.jar";
        Self {
            installers: vec![
                MirrorSource::new(
                    "MinecraftForge",
                    &format!("https://files.minecraftforge.net/{FORGE_PATH}"),
                ),
                MirrorSource::new(
                    "BMCLAPI",
                    &format!("https://bmclapi2.bangbang93.com/maven/{FORGE_PATH}"),
                ),
                MirrorSource::new(
                    "MCBBS",
                    &format!("https://download.mcbbs.net/maven/{FORGE_PATH}"),
                ),
                MirrorSource::new(
                    "Tencent Cloud",
                    &format!("https://mirrors.cloud.tencent.com/forge/maven/{FORGE_PATH}"),
                ),
            ],
            blocked_domains: vec!["mirrors.ustc.edu.cn".to_owned(), "cernet.edu.cn".to_owned()],
            cors_proxy: Some("https://corsproxy.io/?{url}".to_owned()),
            max_redirects: 5,
        }
    }
}

impl ForgeMirrors {
    #[must_use]
    pub fn is_blocked(&self, url: &str) -> bool {
        self.blocked_domains.iter().any(|d| url.contains(d.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactMirrors {
    pub libraries: Vec<MirrorSource>,
    pub assets: Vec<MirrorSource>,
    pub meta: Vec<MirrorSource>,
}

impl Default for ArtifactMirrors {
    fn default() -> Self {
        let official = MirrorSource::new("Official", "{url}");
        Self {
            libraries: vec![
                official.clone(),
                MirrorSource::new("BMCLAPI", "https://bmclapi2.bangbang93.com/maven/{path}"),
            ],
            assets: vec![
                official.clone(),
                MirrorSource::new("BMCLAPI", "https://bmclapi2.bangbang93.com/assets/{path}"),
            ],
            meta: vec![
                official,
                MirrorSource::new("BMCLAPI", "https://bmclapi2.bangbang93.com/{path}"),
            ],
        }
    }
}

impl ArtifactMirrors {
    #[must_use]
    pub fn for_kind(&self, kind: ArtifactKind) -> &[MirrorSource] {
        match kind {
            ArtifactKind::Library => &self.libraries,
            ArtifactKind::Asset => &self.assets,
            ArtifactKind::Meta => &self.meta,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub forge: ForgeMirrors,
    pub artifacts: ArtifactMirrors,
}

impl MirrorConfig {
    pub const FILE_NAME: &'static str = "mirrors.json";

    /// Loads `mirrors.json` from the launcher directory,
    /// or the built-in defaults if there is none.
    ///
    /// A broken file is reported and ignored.
    #[must_use]
    pub fn load_or_default(launcher_dir: &Path) -> Self {
        match Self::load(launcher_dir) {
            Ok(Some(n)) => n,
            Ok(None) => Self::default(),
            Err(error) => {
                err!("Ignoring {}: {error}", Self::FILE_NAME);
                Self::default()
            }
        }
    }

    pub fn load(launcher_dir: &Path) -> Result<Option<Self>, JsonFileError> {
        let path = launcher_dir.join(Self::FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).path(&path)?;
        Ok(Some(serde_json::from_str(&text).json(text)?))
    }
}
