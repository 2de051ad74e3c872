pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Doctor, SchedulingDefaults, Slot, WeeklySchedule, NOT_AVAILABLE};
pub use services::profile::DoctorProfileService;
pub use services::schedule::{generate_slots, slot_boundaries};
