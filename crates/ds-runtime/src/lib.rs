mod engine;
mod evaluator;
mod events;
mod localization;
mod progress;
mod registry;
mod value_bridge;
mod variables;

pub use engine::{DialogueEngine, DialogueEngineOptions};
pub use evaluator::{ExpressionRunner, HostFunction};
pub use events::{DialogueEvent, DialogueListener};
pub use localization::LocalizationCatalog;
pub use progress::DialogueProgress;
pub use registry::NodeRegistry;
pub use variables::VariableStore;
