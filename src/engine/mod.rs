pub mod orchestrator;

mod tests;
