pub mod error;
pub mod types;
pub mod value;

pub use error::{ClientError, FieldErrors, Result};
pub use types::{FieldKey, Identity, ROOT_KIND};
pub use value::Value;
