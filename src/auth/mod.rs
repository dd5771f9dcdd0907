pub mod claims;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod permissions;

pub use claims::{Claims, RefreshClaims};
pub use jwt::JwtService;
pub use middleware::{AuthMiddleware, AuthenticatedUser};
pub use permissions::{is_creator, require_creator};
