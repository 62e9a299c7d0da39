mod key;
mod ttl;

pub use key::{MAX_KEY_LENGTH, validate_key};
pub use ttl::TtlStrategy;
