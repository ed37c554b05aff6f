pub mod model;

pub use model::LoggingAssetModel;
