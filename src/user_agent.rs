//! Default User-Agent for outgoing requests.

/// Identifies the tool and its version on every request. A scraper's
/// configured `user_agent` overrides this per listing request.
#[must_use]
pub fn default_user_agent() -> &'static str {
    concat!("needl/", env!("CARGO_PKG_VERSION"))
}
