pub mod claims;
pub mod identity;
pub mod jwt;
pub mod session;
pub mod session_store;
