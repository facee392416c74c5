pub mod forecast;
pub mod sample;
