// Adapters: concrete implementations of the domain ports for the outside world.

pub mod console;
#[cfg(target_os = "linux")]
pub mod fifo;
pub mod inventory_file;
