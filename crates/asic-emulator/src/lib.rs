//! Networked emulator for the MERCURY ASIC SPI register interface.
//!
//! An [`EmulatorServer`] exposes one shared [`asic_model::RegisterModel`] to
//! any number of TCP clients, and [`EmulatorClient`] / [`AsicDevice`] drive
//! it the way control software drives the real device.

/// Blocking client and device-level helper.
pub mod client;
/// Wire frames and transaction payload encoding.
pub mod codec;
/// Emulator runtime configuration.
pub mod config;
/// Error types for every emulator concern.
pub mod error;
/// Tracing subscriber setup.
pub mod logging;
/// Emulator server, processing point and connection monitor.
pub mod server;

pub use client::{AsicDevice, EmulatorClient};
pub use codec::Frame;
pub use config::{EmulatorConfig, DEFAULT_ENDPOINT};
pub use error::{ClientError, CodecError, ConfigError, LoggingError, ServerError};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use server::{EmulatorServer, ServerStatus};
