//! Library crate for portcheck exposing the probe stages and report helpers.
pub mod config;
pub mod firewall;
pub mod listeners;
pub mod logging;
pub mod netdetect;
pub mod pipeline;
pub mod ports;
pub mod report;
pub mod tcp;
pub mod types;
pub mod udp;
