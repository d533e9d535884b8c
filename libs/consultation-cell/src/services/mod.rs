pub mod booking;
pub mod lifecycle;
pub mod settlement;
pub mod slots;
