//! Bearer-token authentication and password handling.

pub mod extractors;
pub mod password;
pub mod token;

pub use extractors::AdminUser;
pub use token::{TokenKeys, TokenPurpose};
