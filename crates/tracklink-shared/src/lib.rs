pub mod constants;
pub mod events;
pub mod notification;
