//! Core utilities shared by the engine and the store

pub mod clock;

pub use clock::{parse_payment_date, Clock, FixedClock, SystemClock};
