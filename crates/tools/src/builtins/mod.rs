//! The eleven concrete tools named in the external contract (`spec.md` §6).

pub mod bash;
pub mod edit;
pub mod glob_tool;
pub mod grep;
pub mod list;
pub mod multiedit;
pub mod read;
pub mod todo;
pub mod webfetch;
pub mod websearch;
pub mod write;
