//! Workspace integration tests for the taskline crates.

#[cfg(test)]
mod backends;
