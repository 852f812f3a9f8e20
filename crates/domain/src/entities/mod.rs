pub mod connection;
pub mod frame;
pub mod message;
pub mod notification;
pub mod presence;
