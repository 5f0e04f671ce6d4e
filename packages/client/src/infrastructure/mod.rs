//! Infrastructure layer: concrete implementations of the domain ports and
//! the wire-format DTOs.

pub mod dto;
pub mod token;
pub mod transport;

pub use token::{HttpTokenProvider, StaticTokenProvider};
pub use transport::WsTransportFactory;
