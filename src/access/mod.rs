// Admission and authentication
//
// The gate is the only writer of a room's membership set; every other
// room-scoped operation authenticates through it first.

// Public API - what other modules can use
pub use cookie::{auth_cookie, token_from_headers, AUTH_COOKIE};
pub use gate::AccessGate;

// Internal modules
mod cookie;
mod gate;
