//! Webhook Subscription & Delivery System
//!
//! HTTP POST delivery of engine events to subscriber endpoints with HMAC
//! signing, bounded retries, and per-subscriber bookkeeping.

pub mod delivery;
pub mod dispatch;
pub mod events;
pub mod registry;
pub mod signing;
pub mod types;
