pub mod archive;
pub mod fetch;
pub mod launcher;
pub mod pipeline;
