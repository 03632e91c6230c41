//! Request handlers.

pub mod health;
pub mod history;
pub mod images;
pub mod index;
mod upload;
pub mod videos;

pub use health::*;
pub use history::*;
pub use images::*;
pub use index::*;
pub use videos::*;
