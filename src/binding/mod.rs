//! Property binding: container lifetime, collection ordering, and the
//! get/set dispatcher over binding kinds.

pub mod container;
pub mod order;
pub mod resolver;
