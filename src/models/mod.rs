pub mod address;
pub mod booking;
pub mod notification;
pub mod provider;
pub mod service;
