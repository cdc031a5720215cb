mod auth;
mod health;

pub use auth::*;
pub use health::*;
