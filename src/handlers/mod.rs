pub mod admin;
pub mod admin_accounts;
pub mod bookings;
pub mod catalog;
pub mod customers;
pub mod health;
