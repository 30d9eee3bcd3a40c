pub mod check;
pub mod mirrors;
pub mod start;
