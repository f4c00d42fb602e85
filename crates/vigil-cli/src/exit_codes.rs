//! Process exit codes. Part of the CLI contract.

pub const SUCCESS: i32 = 0;
/// The input was blocked, unsafe, or the ticket was rejected.
pub const BLOCKED: i32 = 1;
/// Bad arguments, unreadable files, missing keys or other setup failures.
pub const CONFIG_ERROR: i32 = 2;
