//! Supabase realtime over Phoenix channels.

mod client;
mod messages;

pub use client::{ConnectionState, RealtimeClient, RealtimeConfig};
pub use messages::{topic_for, Inbound, PhoenixMessage};
