mod backend;
mod counter;
mod memory;
#[cfg(test)]
mod tests;

pub use backend::*;
pub use counter::*;
pub use memory::*;
