pub mod events;
pub mod interactions;
