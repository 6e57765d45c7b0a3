// File: src/bgp/mod.rs
//
// Value types shared by every layer: prefixes, AS numbers and routes.

mod prefix;
mod route;

pub use self::prefix::*;
pub use self::route::*;
