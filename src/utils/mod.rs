pub mod jwt;
pub mod password;
pub mod pkce;
pub mod query_coerce;
pub mod secret;
