//! # Listing, installing and launching Minecraft versions
//!
//! This is a crate of 16Launcher.
//!
//! **Not recommended to use in your own projects!**
//!
//! This crate contains:
//! - [`VersionCatalog`]: the version list and loader version lookups
//! - [`ArtifactInstaller`]: downloading a version's jar, libraries,
//!   natives and assets (with mirror fallback and sha1 checks)
//! - [`SessionProvider`]: the stored Ely.by session
//! - [`LaunchOrchestrator`]: resolve, install, build the command
//!   line and start the game
//!
//! Mod loader installation (Forge, OptiFine's patcher, ...)
//! lives in `sl_mod_manager`.
//!
//! # Natives
//! Platform-specific libraries come in three flavours
//! in the version JSONs (`natives: *`, `*-natives-*` names
//! and `classifiers`). All of them end up extracted
//! into `versions/<id>/natives`.

#![allow(clippy::missing_errors_doc)]

pub mod catalog;
pub mod install;
pub mod launch;
pub mod session;

pub use catalog::{CatalogError, ResolvedVersion, VersionCatalog, VersionInfo};
pub use install::{ArtifactInstaller, InstallError};
pub use launch::{
    LaunchError, LaunchOptions, LaunchOrchestrator, LaunchOutcome, LaunchRequest, LaunchState,
};
pub use session::{AuthCollaborator, AuthError, Credentials, Session, SessionProvider};
