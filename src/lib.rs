pub mod core;
pub mod exchanges;

pub use crate::core::config::{ClientConfig, ConfigError, Credentials};
pub use crate::core::errors::{ApiError, CbproError, ErrorKind};
pub use crate::core::kernel::{EndpointClass, RateLimitPolicy, RestClient};
pub use crate::exchanges::coinbase_pro::{build_client, CoinbaseBuilder, CoinbaseRest};
