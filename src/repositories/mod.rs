pub mod admin_user;
pub mod authorization_code;
pub mod client_scope_grant;
pub mod login_record;
pub mod oauth_client;
pub mod oauth_token;
pub mod user;

pub use admin_user::AdminUserRepository;
pub use authorization_code::AuthorizationCodeRepository;
pub use client_scope_grant::ClientScopeGrantRepository;
pub use login_record::LoginRecordRepository;
pub use oauth_client::ClientRepository;
pub use oauth_token::TokenRepository;
pub use user::UserRepository;
