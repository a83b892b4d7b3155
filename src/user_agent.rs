//! Shared User-Agent string for API, image, and library traffic.
//!
//! The content API asks clients to identify themselves; a single format keeps
//! every request consistent and easy to update.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/mangadl";

/// Default User-Agent for every outbound request (identifies the tool).
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("mangadl/{version} (library-archiver; +{PROJECT_UA_URL})")
}
