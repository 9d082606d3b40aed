pub mod attachment_pipeline;
pub mod event_router;
pub mod message_service;
pub mod push;
pub mod session;
pub mod staging;
pub mod transport;
pub mod typing;
