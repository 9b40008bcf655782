//! Client constants
//!
//! Centralized location for protocol paths and configuration defaults.

use std::time::Duration;

// Protocol
pub const TOKEN_SERVICE_PATH: &str = "/rest/oauthTokenService/v1/token";
pub const GRANT_TYPE_CLIENT_CREDENTIALS: &str = "client_credentials";
pub const PAGE_OFFSET_PARAM: &str = "offset";
pub const PAGE_LIMIT_PARAM: &str = "limit";
pub const LINKS_FIELD: &str = "links";

// Token cache: tokens are treated as expired this long before the server says so
pub const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(600);

// Pagination
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Listings reporting more pages than this are treated as corrupt.
pub const MAX_LISTING_PAGES: u64 = 100_000;

// Configuration defaults
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_RETRY_COUNT: u32 = 0;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10;

// Connection pool
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
pub const USER_AGENT: &str = concat!("restbatch/", env!("CARGO_PKG_VERSION"));
