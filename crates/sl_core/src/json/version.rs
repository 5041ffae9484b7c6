use std::{
    collections::BTreeMap,
    fmt::Debug,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{constants::*, IntoIoError, IntoJsonError, JsonFileError};

/// A version JSON, as found in `versions/<id>/<id>.json`.
///
/// This covers both Mojang's own files and loader profiles
/// (Fabric, Quilt, Forge, OptiFine). Loader profiles only
/// carry what they change and point at their base version
/// through `inheritsFrom`, which is why almost everything
/// here is optional. Use [`VersionDetails::merge_parent`]
/// to get the effective version.
#[allow(non_snake_case)]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct VersionDetails {
    /// Name of the version.
    pub id: String,
    /// The base version this one extends.
    pub inheritsFrom: Option<String>,
    /// Which version's jar to run (used by some loader profiles).
    pub jar: Option<String>,

    /// An index/list of assets (music/sounds) to be downloaded.
    pub assetIndex: Option<AssetIndexInfo>,
    /// Which version of the assets to be downloaded.
    pub assets: Option<String>,
    /// Where to download the client/server jar.
    pub downloads: Option<Downloads>,
    /// Version of java required.
    pub javaVersion: Option<JavaVersionJson>,
    /// Library dependencies of the version that need to be downloaded.
    #[serde(default)]
    pub libraries: Vec<Library>,
    /// Which is the main class in the jar that has the main function.
    pub mainClass: Option<String>,

    /// The list of command line arguments.
    ///
    /// This one is used in Minecraft 1.12.2 and below,
    /// whereas `arguments` is used in 1.13 and above
    pub minecraftArguments: Option<String>,
    /// The list of command line arguments.
    ///
    /// This is used in Minecraft 1.13 and above,
    /// whereas `minecraftArguments` is used in 1.12.2 and below.
    pub arguments: Option<Arguments>,

    pub releaseTime: Option<String>,
    pub time: Option<String>,
    /// Type of version, such as `release` or `snapshot`.
    pub r#type: Option<String>,
}

impl VersionDetails {
    #[must_use]
    pub fn json_path(versions_dir: &Path, id: &str) -> PathBuf {
        versions_dir.join(id).join(format!("{id}.json"))
    }

    #[must_use]
    pub fn jar_path(versions_dir: &Path, id: &str) -> PathBuf {
        versions_dir.join(id).join(format!("{id}.jar"))
    }

    /// Loads `versions/<id>/<id>.json`.
    ///
    /// # Errors
    /// - file doesn't exist or couldn't be read
    /// - file isn't a valid version JSON
    pub async fn load(versions_dir: &Path, id: &str) -> Result<Self, JsonFileError> {
        let path = Self::json_path(versions_dir, id);
        let text = tokio::fs::read_to_string(&path).await.path(&path)?;
        Ok(serde_json::from_str(&text).json(text)?)
    }

    /// Blocking version of [`VersionDetails::load`].
    pub fn load_s(versions_dir: &Path, id: &str) -> Result<Self, JsonFileError> {
        let path = Self::json_path(versions_dir, id);
        let text = std::fs::read_to_string(&path).path(&path)?;
        Ok(serde_json::from_str(&text).json(text)?)
    }

    /// Loads `id` and everything it inherits from,
    /// returning the merged (effective) version.
    pub fn load_merged_s(versions_dir: &Path, id: &str) -> Result<Self, JsonFileError> {
        const MAX_DEPTH: usize = 8;

        let mut details = Self::load_s(versions_dir, id)?;
        let mut depth = 0;
        while let Some(parent_id) = details.inheritsFrom.clone() {
            depth += 1;
            if depth > MAX_DEPTH {
                break;
            }
            let parent = Self::load_s(versions_dir, &parent_id)?;
            details = details.merge_parent(parent);
        }
        Ok(details)
    }

    /// Combines a loader profile with the version it inherits from.
    ///
    /// The child's scalar fields win. Libraries and
    /// `arguments` are concatenated, child first.
    #[must_use]
    pub fn merge_parent(self, parent: VersionDetails) -> VersionDetails {
        let mut libraries = self.libraries;
        libraries.extend(parent.libraries);

        let arguments = match (self.arguments, parent.arguments) {
            (Some(child), Some(parent)) => Some(Arguments {
                game: parent.game.into_iter().chain(child.game).collect(),
                jvm: parent.jvm.into_iter().chain(child.jvm).collect(),
            }),
            (child, parent) => child.or(parent),
        };

        VersionDetails {
            id: self.id,
            inheritsFrom: parent.inheritsFrom,
            jar: self.jar.or(parent.jar).or(Some(parent.id)),
            assetIndex: self.assetIndex.or(parent.assetIndex),
            assets: self.assets.or(parent.assets),
            downloads: self.downloads.or(parent.downloads),
            javaVersion: self.javaVersion.or(parent.javaVersion),
            libraries,
            mainClass: self.mainClass.or(parent.mainClass),
            minecraftArguments: self.minecraftArguments.or(parent.minecraftArguments),
            arguments,
            releaseTime: self.releaseTime.or(parent.releaseTime),
            time: self.time.or(parent.time),
            r#type: self.r#type.or(parent.r#type),
        }
    }

    /// The version whose jar goes on the classpath.
    #[must_use]
    pub fn get_jar_id(&self) -> &str {
        self.jar.as_deref().unwrap_or(&self.id)
    }

    #[must_use]
    pub fn get_assets_id(&self) -> Option<&str> {
        self.assetIndex
            .as_ref()
            .map(|n| n.id.as_str())
            .or(self.assets.as_deref())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Value>,
    #[serde(default)]
    pub jvm: Vec<Value>,
}

/// Evaluates a modern `arguments.game`/`arguments.jvm` list.
///
/// Entries are either plain strings or
/// `{ "rules": [...], "value": "x" | ["x", "y"] }`.
/// Every launcher feature (demo mode, custom resolution,
/// quick play) is treated as off.
#[must_use]
pub fn flatten_arguments(args: &[Value]) -> Vec<String> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Value::String(s) => out.push(s.clone()),
            Value::Object(obj) => {
                let rules: Vec<Rule> = obj
                    .get("rules")
                    .and_then(|r| serde_json::from_value(r.clone()).ok())
                    .unwrap_or_default();
                if !rules_allow(&rules) {
                    continue;
                }
                match obj.get("value") {
                    Some(Value::String(s)) => out.push(s.clone()),
                    Some(Value::Array(values)) => out.extend(
                        values
                            .iter()
                            .filter_map(|n| n.as_str().map(str::to_owned)),
                    ),
                    _ => {}
                }
            }
            _ => {}
        }
    }
    out
}

#[allow(non_snake_case)]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AssetIndexInfo {
    pub id: String,
    pub sha1: String,
    pub size: Option<usize>,
    pub totalSize: Option<usize>,
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Downloads {
    pub client: Option<Download>,
    pub server: Option<Download>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Download {
    pub sha1: String,
    pub size: Option<usize>,
    pub url: String,
}

#[allow(non_snake_case)]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JavaVersionJson {
    pub component: String,
    pub majorVersion: usize,
}

/// The contents of `assets/indexes/<id>.json`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AssetIndex {
    #[serde(default)]
    pub objects: BTreeMap<String, AssetObject>,
    /// Old indexes (`legacy`): objects are also laid out by name
    /// under `assets/virtual/<id>/`.
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    /// Very old indexes (`pre-1.6`): objects are also laid out
    /// by name under `<gameDir>/resources/`.
    #[serde(default)]
    pub map_to_resources: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AssetObject {
    pub hash: String,
    pub size: usize,
}

impl AssetObject {
    /// `ab/abcdef...`, relative to `assets/objects/`
    /// and to the resources server.
    #[must_use]
    pub fn get_path(&self) -> String {
        let prefix = self.hash.get(..2).unwrap_or(&self.hash);
        format!("{prefix}/{}", self.hash)
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Library {
    pub name: Option<String>,
    pub downloads: Option<LibraryDownloads>,
    pub extract: Option<LibraryExtract>,
    pub rules: Option<Vec<Rule>>,
    pub natives: Option<BTreeMap<String, String>>,
    /// Maven repository base url (Fabric/Quilt style libraries).
    pub url: Option<String>,
    /// Checksum for Fabric/Quilt style libraries.
    pub sha1: Option<String>,
}

const DEFAULT_LIBRARY_REPO: &str = "https://libraries.minecraft.net/";

impl Library {
    /// The main jar of this library, if it has one.
    #[must_use]
    pub fn get_artifact(&self) -> Option<LibraryDownloadArtifact> {
        if let Some(artifact) = self.downloads.as_ref().and_then(|n| n.artifact.as_ref()) {
            let mut artifact = artifact.clone();
            if artifact.path.is_none() {
                artifact.path = Some(artifact.get_path());
            }
            return Some(artifact);
        }
        // Natives-only entries (old LWJGL) have no main jar.
        if self.downloads.is_some() {
            return None;
        }

        let name = self.name.as_ref()?;
        let path = maven_path(name)?;
        let base = self.url.as_deref().unwrap_or(DEFAULT_LIBRARY_REPO);
        let base = if base.ends_with('/') {
            base.to_owned()
        } else {
            format!("{base}/")
        };
        Some(LibraryDownloadArtifact {
            url: format!("{base}{path}"),
            path: Some(path),
            sha1: self.sha1.clone(),
            size: None,
        })
    }

    /// The natives jar for the current OS, if this library has one.
    #[must_use]
    pub fn get_native_artifact(&self) -> Option<LibraryDownloadArtifact> {
        let classifier = self.natives.as_ref()?.get(OS_NAME)?;
        let classifier = classifier.replace("${arch}", ARCH_BITS);
        let artifact = self
            .downloads
            .as_ref()?
            .classifiers
            .as_ref()?
            .get(&classifier)?;
        let mut artifact = artifact.clone();
        if artifact.path.is_none() {
            artifact.path = Some(artifact.get_path());
        }
        Some(artifact)
    }

    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.rules.as_ref().is_none_or(|rules| rules_allow(rules))
    }
}

impl Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct(&if let Some(name) = &self.name {
            format!("Library ({name})")
        } else {
            "Library".to_owned()
        });
        let mut s = &mut s;
        if let Some(downloads) = &self.downloads {
            s = s.field("downloads", &downloads);
        }
        if let Some(rules) = &self.rules {
            s = s.field("rules", &rules);
        }
        if let Some(natives) = &self.natives {
            s = s.field("natives", &natives);
        }
        if let Some(url) = &self.url {
            s = s.field("url", &url);
        }
        s.finish()
    }
}

/// `group:artifact:version[:classifier][@ext]` to
/// `group/path/artifact/version/artifact-version[-classifier].ext`
#[must_use]
pub fn maven_path(name: &str) -> Option<String> {
    let (coords, ext) = name.split_once('@').unwrap_or((name, "jar"));
    let mut parts = coords.split(':');
    let group = parts.next()?;
    let artifact = parts.next()?;
    let version = parts.next()?;
    let classifier = parts.next();

    let group = group.replace('.', "/");
    Some(match classifier {
        Some(classifier) => {
            format!("{group}/{artifact}/{version}/{artifact}-{version}-{classifier}.{ext}")
        }
        None => format!("{group}/{artifact}/{version}/{artifact}-{version}.{ext}"),
    })
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LibraryExtract {
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LibraryDownloads {
    pub artifact: Option<LibraryDownloadArtifact>,
    pub classifiers: Option<BTreeMap<String, LibraryDownloadArtifact>>,
}

/// A rule on a library or argument.
///
/// Mojang semantics: with no rules, allowed. With rules,
/// start from disallowed and let every *matching* rule
/// set the outcome to its action; the last match wins.
#[derive(Serialize, Deserialize, Clone)]
pub struct Rule {
    pub action: String,
    pub os: Option<RuleOs>,
    pub features: Option<BTreeMap<String, bool>>,
}

impl Rule {
    fn matches(&self) -> bool {
        if let Some(features) = &self.features {
            // We enable no launcher features
            if features.values().any(|n| *n) {
                return false;
            }
        }
        self.os.as_ref().is_none_or(RuleOs::matches)
    }
}

impl Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(os) = &self.os {
            write!(f, "{} for {os:?}", self.action)
        } else {
            write!(f, "{}", self.action)
        }
    }
}

#[must_use]
pub fn rules_allow(rules: &[Rule]) -> bool {
    if rules.is_empty() {
        return true;
    }
    let mut allowed = false;
    for rule in rules {
        if rule.matches() {
            allowed = rule.action == "allow";
        }
    }
    allowed
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RuleOs {
    pub name: Option<String>,
    pub arch: Option<String>,
}

impl RuleOs {
    fn matches(&self) -> bool {
        let name_ok = self.name.as_ref().is_none_or(|n| {
            n == OS_NAME || *n == format!("{OS_NAME}-{ARCH}")
        });
        let arch_ok = self.arch.as_ref().is_none_or(|a| match a.as_str() {
            "x86" => ARCH == "x86",
            other => other == ARCH,
        });
        name_ok && arch_ok
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct LibraryDownloadArtifact {
    pub path: Option<String>,
    pub sha1: Option<String>,
    pub size: Option<u64>,
    pub url: String,
}

impl Debug for LibraryDownloadArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("LibraryDownloadArtifact");
        let mut s = &mut s;
        if let Some(path) = &self.path {
            s = s.field("path", path);
        }
        s = s.field("url", &self.url);
        if let Some(sha1) = &self.sha1 {
            s = s.field("sha1", sha1);
        }
        s.finish()
    }
}

impl LibraryDownloadArtifact {
    #[must_use]
    pub fn get_path(&self) -> String {
        self.path.clone().unwrap_or_else(|| {
            // https://libraries.minecraft.net/net/java/jinput/jinput/2.0.5/jinput-2.0.5.jar
            // -> libraries.minecraft.net/net/java/jinput/jinput/2.0.5/jinput-2.0.5.jar
            let url = self
                .url
                .strip_prefix("https://")
                .or(self.url.strip_prefix("http://"))
                .unwrap_or(&self.url);

            // -> net/java/jinput/jinput/2.0.5/jinput-2.0.5.jar
            if let Some(pos) = url.find('/') {
                url[pos + 1..].to_string()
            } else {
                url.to_string()
            }
        })
    }
}
