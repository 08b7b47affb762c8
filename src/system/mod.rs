// src/system/mod.rs

pub mod console;
