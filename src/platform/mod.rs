pub mod admin;
pub mod capture;
pub mod telegram;
pub mod transport;
