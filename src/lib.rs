//! Archon - PSO Blue Burst login server
//!
//! The CHARACTER port of the login flow: character roster, key config,
//! guildcard and parameter file transfers.

/// Server configuration
pub mod config;
/// Packet framing and the cipher seam
pub mod network;
/// Wire records and packet builders
pub mod protocol;
/// Server implementations
pub mod servers;
