//! Client side of the list protocol

pub mod controller;
#[cfg(feature = "http")]
pub mod http;
pub mod list;

pub use controller::{ListController, ListState, SearchInput};
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use list::ListClient;
