//! Authentication: token issuance, password hashing and the access guard

pub mod guard;
pub mod jwt;
pub mod password;

pub use guard::{AccessGuard, CurrentUser, MaybeUser, Moderator, SESSION_COOKIE};
pub use jwt::{Claims, Role, TokenService};
