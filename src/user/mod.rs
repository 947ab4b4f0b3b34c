pub mod user_models;
pub mod user_dto;
pub mod user_repository;
pub mod user_handlers;
pub mod user_service;

pub use user_models::{User, UserRole};
pub use user_repository::UserStore;
