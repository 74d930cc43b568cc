pub mod competitor;
pub mod finding;
pub mod payload;
pub mod request;
pub mod step;
