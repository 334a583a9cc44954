pub mod io;
pub mod logging;

pub use io::{Console, TerminalConsole};
