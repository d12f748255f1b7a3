pub mod user_repo;
pub use user_repo::UserRepository;
pub mod membership_repo;
pub use membership_repo::MembershipRepository;
