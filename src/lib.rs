#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod api;
pub mod config;
pub mod context;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod session;
pub mod signer;
pub mod storage;
pub mod trade;
pub mod types;

pub use context::ClientContext;
pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;
