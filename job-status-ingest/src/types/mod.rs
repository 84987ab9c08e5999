pub mod constant;
pub mod job;
pub mod message;
pub mod params;
