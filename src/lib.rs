pub mod commands;
pub mod error;
pub mod http;
pub mod imports;
pub mod index;
pub mod package;
pub mod pip;
pub mod process;
pub mod runtime;
pub mod session;
pub mod status;
pub mod tasks;
