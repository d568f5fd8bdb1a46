pub mod cost;
pub mod delivery;
pub mod event_bus;
pub mod jwt;
