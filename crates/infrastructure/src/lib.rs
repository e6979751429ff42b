//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod argon2_password_hasher;
mod in_memory_role_repository;
mod postgres_role_repository;
mod postgres_token_repository;
mod postgres_user_repository;

pub use argon2_password_hasher::Argon2PasswordHasher;
pub use in_memory_role_repository::InMemoryRoleRepository;
pub use postgres_role_repository::PostgresRoleRepository;
pub use postgres_token_repository::PostgresTokenRepository;
pub use postgres_user_repository::PostgresUserRepository;
