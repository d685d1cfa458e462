//! `WaRelay` Server
//!
//! Integration layer between the public HTTP API and the external WhatsApp
//! connection engine: durable command/event relay over Redis Streams, signed
//! webhook delivery with retries, and the live QR pairing stream.

pub mod api;
pub mod config;
pub mod db;
pub mod pairing;
pub mod streams;
pub mod webhooks;
