//! Global constants used throughout the devc codebase.
//!
//! File layout names, port policy defaults, and credential heuristics live here so
//! the merge engine, configuration defaults, and tests agree on them.

/// Compose document name inside a template directory.
pub const COMPOSE_FILE: &str = "docker-compose.yml";

/// Devcontainer directory inside a template directory.
pub const DEVCONTAINER_DIR: &str = ".devcontainer";

/// Devcontainer JSON document name inside [`DEVCONTAINER_DIR`].
pub const DEVCONTAINER_FILE: &str = "devcontainer.json";

/// Directory under the catalog root holding base templates.
pub const TEMPLATES_DIR: &str = "templates";

/// Subdirectory of a template holding the files that are copied to the output.
pub const TEMPLATE_PAYLOAD_DIR: &str = ".template";

/// Sidecar registry file, relative to the catalog root.
pub const SIDECAR_REGISTRY_FILE: &str = "catalog/sidecars.json";

/// First host port handed out when a declared sidecar port is already claimed.
pub const DEFAULT_OVERFLOW_PORT_BASE: u16 = 45000;

/// Compose service name of the primary workspace container.
///
/// Sidecar fragments never contribute a block under this name.
pub const RESERVED_WORKSPACE_SERVICE: &str = "devcontainer";

/// Values treated as default or placeholder credentials (compared case-insensitively).
pub const DEFAULT_CREDENTIAL_VALUES: &[&str] = &["student", "admin", "changeme", "password"];

/// Top-level compose sections that are unioned by entry name.
pub const SHARED_COMPOSE_SECTIONS: &[&str] = &["volumes", "networks", "configs", "secrets"];

/// Prefix of synthetic placeholder tokens injected by the vault.
pub const PLACEHOLDER_PREFIX: &str = "__DEVC_PH";

/// Environment variable overriding the catalog root.
pub const CATALOG_ROOT_ENV: &str = "DEVC_CATALOG_ROOT";

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "DEVC_CONFIG";

/// How many parent directories catalog discovery walks before giving up.
pub const CATALOG_DISCOVERY_DEPTH: usize = 10;
