pub mod coord;
pub mod datetime;
pub mod error;
pub mod range;
pub mod reference;
pub mod value;

pub use coord::*;
pub use datetime::*;
pub use error::*;
pub use range::*;
pub use reference::*;
pub use value::*;
