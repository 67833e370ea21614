pub use crate::action::{Action, SerializationDirection};
pub use crate::error::{ApiResult, Error, FieldErrors};
pub use crate::types::Timestamp;

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
