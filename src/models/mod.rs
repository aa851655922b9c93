pub mod admin_user;
pub mod authorization_code;
pub mod client_scope_grant;
pub mod login_record;
pub mod oauth_client;
pub mod oauth_token;
pub mod user;

pub use admin_user::*;
pub use authorization_code::*;
pub use client_scope_grant::*;
pub use login_record::*;
pub use oauth_client::*;
pub use oauth_token::*;
pub use user::*;
