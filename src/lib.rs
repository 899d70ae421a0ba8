pub mod chains;
pub mod chatbot;
pub mod communication;
pub mod console;
pub mod core;
pub mod evaluation;
pub mod knowledge;
pub mod llm;
pub mod state;
pub mod templates;

#[cfg(test)]
mod testing;
