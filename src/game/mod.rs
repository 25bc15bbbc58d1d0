//! Minecraft server side of the bridge.
//!
//! This module contains:
//! - RCON client implementing `GameServer`
//! - Server log watcher and line parser producing `GameEvent`s

pub mod client;
pub mod events;
pub mod watcher;

pub use client::RconClient;
pub use watcher::LogWatcher;
