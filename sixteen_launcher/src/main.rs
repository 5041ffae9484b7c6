//! 16Launcher, a headless Minecraft launcher.
//!
//! Installs vanilla versions, Forge, Fabric, Quilt and OptiFine,
//! logs in with Ely.by and launches the game.
//!
//! The actual work happens in the library crates:
//! - `sl_instances`: version catalog, downloads, accounts, launching
//! - `sl_mod_manager`: mod loader installers
//! - `sl_core`: shared plumbing

mod cli;

fn main() {
    cli::start_cli();
}
