//! Command line runner for the cyst-core engine, together with the built-in
//! simulations it can run.

pub mod cli;
pub mod simulations;
