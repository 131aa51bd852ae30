pub mod completer;
pub mod formatter;
pub mod parser;
