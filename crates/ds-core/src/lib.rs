pub mod diagnostics;
pub mod error;
pub mod types;
pub mod value;

pub use diagnostics::*;
pub use error::DialogueScriptError;
pub use types::*;
pub use value::*;
