pub mod app;
pub mod auth;
pub mod grant;
pub mod session_cache;
pub mod token;

pub use app::AppService;
pub use auth::{AccountManager, FanOutOutcome, LoginKind};
pub use grant::GrantEngine;
pub use session_cache::SessionCache;
pub use token::TokenService;
