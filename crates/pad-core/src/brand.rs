//! Branding Constants
//!
//! Single source of truth for product naming and default endpoints.

/// Product display name
pub const PRODUCT_NAME: &str = "Padrelay";

/// Binary executable name
pub const BIN_NAME: &str = "padrelay";

/// Short description
pub const DESCRIPTION: &str = "Controller relay proxy and load harness";

/// Default host the proxy listens on
pub const DEFAULT_BIND_HOST: &str = "127.0.0.1";

/// Default port the proxy listens on
pub const DEFAULT_BIND_PORT: u16 = 8182;

/// Default game backend the proxy pairs every client with
pub const DEFAULT_BACKEND_URL: &str = "ws://127.0.0.1:8181";
