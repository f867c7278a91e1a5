pub mod gateway;
pub mod http_gateway;
pub mod memory;
mod wire;
