//! Data Models
//!
//! Request/response and record types shared by the engine services.

pub mod change;
pub mod command;
pub mod index;
pub mod response;
pub mod search;
pub mod settings;
pub mod task;

pub use change::*;
pub use command::*;
pub use index::*;
pub use response::*;
pub use search::*;
pub use settings::*;
pub use task::*;
