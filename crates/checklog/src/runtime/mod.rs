//! Runtime — logging setup and the single checklog pass.

pub mod boot;
pub mod run;
