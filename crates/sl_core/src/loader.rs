use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which mod-loader (if any) a launch or install targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderType {
    #[default]
    Vanilla,
    Forge,
    Fabric,
    Quilt,
    #[serde(rename = "optifine")]
    OptiFine,
}

impl LoaderType {
    pub const ALL: &'static [Self] = &[
        Self::Vanilla,
        Self::Forge,
        Self::Fabric,
        Self::Quilt,
        Self::OptiFine,
    ];

    #[must_use]
    pub const fn to_str(self) -> &'static str {
        match self {
            LoaderType::Vanilla => "vanilla",
            LoaderType::Forge => "forge",
            LoaderType::Fabric => "fabric",
            LoaderType::Quilt => "quilt",
            LoaderType::OptiFine => "optifine",
        }
    }

    #[must_use]
    pub const fn pretty_name(self) -> &'static str {
        match self {
            LoaderType::Vanilla => "Vanilla",
            LoaderType::Forge => "Forge",
            LoaderType::Fabric => "Fabric",
            LoaderType::Quilt => "Quilt",
            LoaderType::OptiFine => "OptiFine",
        }
    }
}

impl Display for LoaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.pretty_name())
    }
}

#[derive(Debug, Error)]
#[error("unknown loader {0:?} (expected one of: vanilla, forge, fabric, quilt, optifine)")]
pub struct ParseLoaderError(pub String);

impl FromStr for LoaderType {
    type Err = ParseLoaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|n| n.to_str() == lower)
            .ok_or_else(|| ParseLoaderError(s.to_owned()))
    }
}
