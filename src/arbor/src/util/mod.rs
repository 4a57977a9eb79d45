pub mod any;
pub mod erased;
