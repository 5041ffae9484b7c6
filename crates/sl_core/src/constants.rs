use cfg_if::cfg_if;

cfg_if!(
    if #[cfg(any(feature = "simulate_linux_arm64", feature = "simulate_linux_arm32"))] {
        pub const OS_NAME: &str = "linux";
    } else if #[cfg(feature = "simulate_macos_arm64")] {
        pub const OS_NAME: &str = "osx";
    } else if #[cfg(target_os = "macos")] {
        pub const OS_NAME: &str = "osx";
    } else if #[cfg(target_os = "windows")] {
        pub const OS_NAME: &str = "windows";
    } else {
        pub const OS_NAME: &str = "linux";
    }
);

cfg_if!(
    if #[cfg(any(
        feature = "simulate_linux_arm64",
        feature = "simulate_macos_arm64"
    ))] {
        pub const ARCH: &str = "arm64";
    } else if #[cfg(feature = "simulate_linux_arm32")] {
        pub const ARCH: &str = "arm32";
    } else if #[cfg(target_arch = "aarch64")] {
        pub const ARCH: &str = "arm64";
    } else if #[cfg(target_arch = "arm")] {
        pub const ARCH: &str = "arm32";
    } else if #[cfg(target_arch = "x86")] {
        pub const ARCH: &str = "x86";
    } else {
        pub const ARCH: &str = "x86_64";
    }
);

/// Architecture bitness as used by `${arch}` in
/// native library classifiers (`natives-windows-${arch}`).
pub const ARCH_BITS: &str = if cfg!(target_pointer_width = "64") { "64" } else { "32" };

pub const DEFAULT_MEMORY_GB: u32 = 4;

pub const VERSION_MANIFEST_URL: &str =
    "https://launchermeta.mojang.com/mc/game/version_manifest_v2.json";
pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net";

pub const FORGE_METADATA_URL: &str =
    "https://maven.minecraftforge.net/net/minecraftforge/forge/maven-metadata.xml";
pub const FABRIC_META_URL: &str = "https://meta.fabricmc.net/v2";
pub const QUILT_META_URL: &str = "https://meta.quiltmc.org/v3";

pub const ELY_AUTH_URL: &str = "https://authserver.ely.by/auth/authenticate";
pub const ELY_CLIENT_TOKEN: &str = "16Launcher";
pub const ELYBY_HOST: &str = "ely.by";
pub const AUTHLIB_INJECTOR_URL: &str = "https://github.com/yushijinhun/authlib-injector/releases/download/v1.2.5/authlib-injector-1.2.5.jar";
pub const JAVA_RUNTIME_LIST_URL: &str = "https://launchermeta.mojang.com/v1/products/java-runtime/2ec0cc96c44e5a76b9c8b7c39df7210883d12871/all.json";
pub const LEGACY_PATCH_URL: &str = "https://ely.by/load/legacy-patch.jar";

pub const OPTIFINE_PATCHER_URL: &str =
    "https://raw.githubusercontent.com/marvin1099/AutomaticOptifinePatcher/main/optifine_patcher.py";

/// Known-good Fabric loader used when the metadata server can't be reached.
pub const FABRIC_FALLBACK_LOADER: &str = "0.15.7";
