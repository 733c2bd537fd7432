pub mod action;
pub mod order;
pub mod position;
pub mod regime;

pub use action::*;
pub use order::*;
pub use position::*;
pub use regime::*;
