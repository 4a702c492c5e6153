pub mod conversion;
pub mod distance;
pub mod housekeeping;
pub mod pricing;
pub mod session;
pub mod tracking;
