pub mod account;
pub mod auto;
pub mod common;
pub mod conflicts;
pub mod sync;
