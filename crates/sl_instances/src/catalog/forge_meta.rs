use serde::Deserialize;

/// The parts of Forge's `maven-metadata.xml` we read.
#[derive(Debug, Deserialize, Default)]
pub struct MavenMetadata {
    #[serde(default)]
    versioning: Versioning,
}

#[derive(Debug, Deserialize, Default)]
struct Versioning {
    #[serde(default)]
    versions: Versions,
}

#[derive(Debug, Deserialize, Default)]
struct Versions {
    #[serde(default, rename = "version")]
    items: Vec<String>,
}

impl MavenMetadata {
    pub fn parse(xml: &str) -> Result<Self, quick_xml::DeError> {
        quick_xml::de::from_str(xml)
    }

    /// Builds are listed newest first, as `<mc>-<forge>`.
    pub fn find_for_minecraft(&self, mc_version: &str) -> Option<&str> {
        let prefix = format!("{mc_version}-");
        self.versioning
            .versions
            .items
            .iter()
            .find(|n| n.starts_with(&prefix))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::MavenMetadata;

    #[test]
    fn prefix_must_include_the_dash() {
        let metadata = MavenMetadata::parse(
            "<metadata><versioning><versions>\
             <version>1.20.10-1.0.0</version>\
             <version>1.20.1-47.2.0</version>\
             </versions></versioning></metadata>",
        )
        .unwrap();
        assert_eq!(metadata.find_for_minecraft("1.20.1"), Some("1.20.1-47.2.0"));
        assert_eq!(metadata.find_for_minecraft("1.20"), None);
    }
}
