pub mod admin;
pub mod booking;
pub mod customer;
pub mod events;
pub mod service;

pub use admin::{Admin, AdminSummary};
pub use booking::{Booking, BookingDetails, BookingPayload, BookingStatus, NewBooking};
pub use customer::{Customer, CustomerSummary, NewCustomer};
pub use events::{BookingEvent, BookingEventKind};
pub use service::{NewService, Service, ServiceSummary, ServiceUpdate, DEFAULT_SERVICE_DURATION};
