//! Typed entity models. Bodies serialize to camelCase JSON — the exact
//! attribute names the store's write conditions reference.

pub mod billing;
pub mod enums;
pub mod followup;
pub mod patient;
pub mod preset;
pub mod token;
pub mod user;
pub mod visit;

pub use billing::*;
pub use enums::*;
pub use followup::*;
pub use patient::*;
pub use preset::*;
pub use token::*;
pub use user::*;
pub use visit::*;
