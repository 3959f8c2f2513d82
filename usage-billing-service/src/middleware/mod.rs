pub mod tenant;

pub use tenant::BrandContext;
