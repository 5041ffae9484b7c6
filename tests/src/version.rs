use sl_core::LoaderType;

pub struct Version(pub &'static str, pub &'static [LoaderType]);

const fn ver(name: &'static str) -> Version {
    Version(name, &[])
}

const FORGE_FABRIC: [LoaderType; 2] = [LoaderType::Forge, LoaderType::Fabric];

pub const VERSIONS_LWJGL2: &[Version] = &[
    ver("b1.7.3"), // most popular beta version
    // last based on old launcher system, gets the legacy patch
    Version("1.5.2", &[]),
    // after migration to new launcher system
    Version("1.7.10", &[LoaderType::Forge]),
    // one of the most popular release versions
    Version("1.8.9", &[LoaderType::Forge]),
    // last version to use lwjgl2
    Version("1.12.2", &[LoaderType::Forge]),
];

pub const VERSIONS_LWJGL3: &[Version] = &[
    Version("1.14.4", &FORGE_FABRIC), // after migration to lwjgl3, engine rewrites
    Version("1.16.5", &FORGE_FABRIC), // last version to use Java 8
    // after migration to Java 17
    Version("1.18.2", &FORGE_FABRIC),
    Version(
        "1.20.1",
        &[LoaderType::Forge, LoaderType::Fabric, LoaderType::Quilt],
    ),
    Version("1.21.1", &[LoaderType::Fabric, LoaderType::Quilt]),
];
