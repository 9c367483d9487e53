pub mod attendance;
pub mod core;
pub mod records;
pub mod roster;
pub mod sessions;
pub mod stats;
