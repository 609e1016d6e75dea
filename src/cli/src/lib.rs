//! A3S Pull CLI - fetch registry content into the local content store.

pub mod commands;
