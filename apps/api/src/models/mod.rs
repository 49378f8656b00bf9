pub mod record;

pub use record::{Dataset, FieldValue, Record};
