//! One-way pushes to outside services. Each call reports success or failure
//! and nothing is read back into the store.

pub mod calendar;
pub mod notify;
pub mod sheets;

pub use calendar::CalendarClient;
pub use notify::{Notification, Notifier};
pub use sheets::SheetsClient;
