pub mod command;
pub mod component;
pub mod interaction;
pub mod permissions;
pub mod vote;
