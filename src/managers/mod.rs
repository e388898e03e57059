pub mod coordinator;
pub mod rewrite;
pub mod working_gate;
