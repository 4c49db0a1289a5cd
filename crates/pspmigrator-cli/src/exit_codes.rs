//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Not found - the pod or policy does not exist
pub const NOT_FOUND: i32 = 3;

/// Cluster error - API server unreachable, unauthorized, or failing
pub const CLUSTER_ERROR: i32 = 4;

/// Malformed policy - a policy lacks data its strategy requires
pub const MALFORMED_POLICY: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
