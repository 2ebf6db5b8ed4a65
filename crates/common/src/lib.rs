//! Types shared by the mood study crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
