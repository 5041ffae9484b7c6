pub mod manifest;
pub mod version;

pub use manifest::Manifest;
pub use version::{AssetIndex, Library, VersionDetails};
