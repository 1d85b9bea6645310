pub mod idempotency;
pub mod order;
pub mod payment;
pub mod wire;

pub use idempotency::*;
pub use order::*;
pub use payment::*;
