pub mod email_service;
pub mod promotion_service;
pub mod upload_service;
pub mod user_service;
