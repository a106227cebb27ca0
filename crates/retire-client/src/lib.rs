pub mod backend;
pub mod contracts;

pub use backend::*;
pub use contracts::*;
