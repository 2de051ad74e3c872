pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Appointment, AppointmentStatus, SchedulingError};
pub use services::booking::BookingService;
pub use services::conflict::available_slots;
pub use services::lifecycle::LifecycleService;
pub use services::reschedule::RescheduleService;
