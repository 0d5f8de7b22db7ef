pub mod booking;
pub mod credentials;
pub mod events;
pub mod mail;
pub mod otp;
pub mod policy;
pub mod precheck;
