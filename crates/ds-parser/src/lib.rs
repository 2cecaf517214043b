mod classify;
mod condition;
mod cursor;
mod parser;
mod scope;
mod splitter;

pub use parser::ScriptParser;
