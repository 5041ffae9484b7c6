//! Fabric and Quilt.
//!
//! Both publish a ready-made launch profile
//! (`fabric-loader-<loader>-<mc>.json` and its Quilt
//! twin) that inherits from the vanilla version, so
//! installing one is a regular version install.

use sl_core::{err, info, LoaderType, ProgressReporter, FABRIC_FALLBACK_LOADER};
use sl_instances::catalog::fabric_launch_id;

use super::{LoaderInstallError, ModLoaderInstaller};

impl ModLoaderInstaller {
    pub(super) async fn install_fabric_like(
        &self,
        loader: LoaderType,
        mc_version: &str,
        loader_version: Option<&str>,
        progress: &ProgressReporter,
    ) -> Result<String, LoaderInstallError> {
        let fail = |message: String| LoaderInstallError::Fabric { loader, message };

        progress.status(format!("Looking up {loader} version"));
        let (loader_version, id) = if loader == LoaderType::Quilt {
            let loader_version = match loader_version {
                Some(n) => n.to_owned(),
                None => self
                    .catalog
                    .latest_quilt_loader(mc_version)
                    .await
                    .map_err(|n| fail(n.to_string()))?,
            };
            let id = self
                .catalog
                .quilt_profile_id(mc_version, &loader_version)
                .await
                .map_err(|n| fail(n.to_string()))?;
            (loader_version, id)
        } else {
            let loader_version = match loader_version {
                Some(n) => n.to_owned(),
                None => self.latest_fabric_or_fallback().await,
            };
            let id = fabric_launch_id(&loader_version, mc_version);
            (loader_version, id)
        };

        info!("Installing {loader} {loader_version} ({id})");
        progress.status(format!("Installing {loader} {loader_version}"));
        self.installer
            .ensure_installed(&id, progress)
            .await
            .map_err(|n| fail(n.to_string()))?;

        Ok(format!("{loader} {loader_version} for {mc_version} installed"))
    }

    async fn latest_fabric_or_fallback(&self) -> String {
        match self.catalog.latest_fabric_loader().await {
            Ok(n) => n,
            Err(error) => {
                err!("{error}\nUsing Fabric loader {FABRIC_FALLBACK_LOADER}");
                FABRIC_FALLBACK_LOADER.to_owned()
            }
        }
    }
}
