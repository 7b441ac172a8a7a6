//! ESP32-S3 board adapters for the quote device engine.

#![no_std]

pub mod input;
pub mod network;
pub mod platform;
pub mod render;
pub mod storage;
