// Build-time identity, logged at startup

/// Package version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name (from Cargo.toml).
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `name vversion`, e.g. for the startup banner.
pub fn banner() -> String {
    format!("{} v{}", NAME, VERSION)
}
