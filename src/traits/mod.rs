mod driver;

pub use driver::{DatabaseDriver, HandleConfig, ValueMode};
