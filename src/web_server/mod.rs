//! HTTP adapter exposing submit, status, and cancel over JSON

pub mod server;

#[cfg(test)]
mod tests;

pub use server::WebServer;
