pub mod forecast_repo;
pub mod sample_repo;

pub use forecast_repo::ForecastRepo;
pub use sample_repo::SampleRepo;
