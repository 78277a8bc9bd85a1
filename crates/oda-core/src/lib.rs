pub mod catalog;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod manifest;
pub mod platform;
pub mod retention;
pub mod tools;

#[cfg(test)]
mod tests;
#[cfg(test)]
mod testutil;
