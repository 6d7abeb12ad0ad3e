pub mod mock;
pub mod timeout;
