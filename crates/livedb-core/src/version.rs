//! Server version helpers

use semver::Version;

/// First server version that accepts `ALGORITHM=` / `LOCK=` on ALTER TABLE
pub const ONLINE_DDL_MIN_VERSION: Version = Version::new(5, 6, 0);

/// Parse a server version string leniently.
///
/// Servers report versions like `8.0.34-0ubuntu0.22.04.1` or `5.7.44-log`,
/// which are not valid semver, so only the leading `major.minor.patch`
/// digits are used. Missing components default to zero.
pub fn parse_server_version(text: &str) -> Option<Version> {
    let numeric: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let mut parts = numeric.split('.').filter(|p| !p.is_empty());
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);

    Some(Version::new(major, minor, patch))
}

/// Whether the server accepts online DDL clauses
pub fn supports_online_ddl(version: &Version) -> bool {
    *version >= ONLINE_DDL_MIN_VERSION
}
