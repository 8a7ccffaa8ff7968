pub mod capture;
pub mod device;
pub mod levels;
