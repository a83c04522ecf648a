//! # Domain Models
//!
//! These structs represent the core entities of snipsocial.
//! We use UUID v7 for time-ordered, globally unique identification.

pub mod content;
pub mod friendship;
pub mod interaction;
pub mod user;

pub use content::*;
pub use friendship::*;
pub use interaction::*;
pub use user::*;
