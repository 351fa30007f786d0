use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub mod common;
pub mod config;
pub mod features;
pub mod geo;
pub mod loader;
pub mod ops;
pub mod summary;
