pub mod table;
pub mod errors;
pub mod ratelimit;
pub mod encoding;

pub use table::{Align, Table};
pub use errors::extract_clean_error;
pub use ratelimit::RateLimiter;
pub use encoding::{base64_field_to_hex, EncodingError, PaymentHashInput};
