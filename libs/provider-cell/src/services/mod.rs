pub mod profile;
pub mod schedule;
