//! The service facade (F): request validation, expression compilation, and
//! dispatch into the storage engine, plus the DynamoDB JSON wire codec and
//! error envelope.

mod dispatch;
mod error;
mod facade;
mod types;
mod wire;

pub use dispatch::dispatch;
pub use error::{CancellationReason, Result, ServiceError};
pub use facade::Service;
pub use wire::{classify, ErrorName};
