//! # Mod loader installation for 16Launcher
//!
//! **Not recommended to use in your own projects!**
//!
//! [`ModLoaderInstaller`] installs Forge, Fabric, Quilt
//! and OptiFine into the launcher's data directory, and
//! [`ModFiles`] manages the mod and pack files there.
//! Launching a loader version afterwards is
//! `sl_instances`' job.

pub mod files;
pub mod loaders;

pub use files::{ModFileError, ModFiles, ModpackContents};
pub use loaders::{LoaderInstallError, ModLoaderInstaller};
