pub mod meeting_models;
pub mod meeting_dto;
pub mod meeting_repository;
pub mod meeting_handlers;
pub mod meeting_service;

pub use meeting_models::Meeting;
pub use meeting_repository::MeetingStore;
