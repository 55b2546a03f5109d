mod entry;
mod session;
#[cfg(test)]
mod tests;

pub use entry::*;
pub use session::*;
