//! End-to-end tests: compile Rabbit source and execute it on the VM,
//! verifying results through the embedding API.

mod harness;

mod classes;
mod control_flow;
mod embedding;
mod exceptions;
mod functions;
mod generators;
mod operators;
