// Module structure for the checklog command.

pub mod conf;
pub mod runtime;
pub mod state;
