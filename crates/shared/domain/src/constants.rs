//! Names shared by the HTTP layer, the OpenAPI document and the clients.

/// OpenAPI tag of the file routes.
pub const FILES_TAG: &str = "Files";
/// OpenAPI tag of the unauthenticated service routes.
pub const SYSTEM_TAG: &str = "System";

/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Query parameter accepted as a fallback credential.
pub const API_KEY_QUERY: &str = "key";

/// Multipart field holding the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// Default configuration file stem, resolved by extension (`server.toml`, `server.yaml`, ...).
pub const CONFIG_FILE: &str = "server";
/// Prefix of configuration environment variables, e.g. `FGATE__SERVER__PORT`.
pub const ENV_PREFIX: &str = "FGATE";
