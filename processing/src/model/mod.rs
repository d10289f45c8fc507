use std::error::Error;

pub mod assessment;
pub mod features;
pub mod transaction;

pub use assessment::*;
pub use features::*;
pub use transaction::*;

pub type GenericError = Box<dyn Error + Send + Sync>;
