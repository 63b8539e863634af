pub mod token;
pub mod user;

pub use token::{TokenKind, TokenRecord};
pub use user::UserProfile;
