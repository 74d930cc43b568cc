pub mod signals;
pub mod threads;
