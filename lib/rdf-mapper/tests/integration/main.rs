#![cfg(test)]
#![allow(clippy::panic_in_result_fn)]

mod aggregate;
mod find;
mod store;
mod write;
