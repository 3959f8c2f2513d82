pub mod validation;

pub use validation::{parse_metric, ValidatedJson, ValidatedQuery};
