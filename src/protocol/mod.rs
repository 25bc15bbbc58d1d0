//! Wire protocols spoken by the adapters.

pub mod onebot;
pub mod rcon;
