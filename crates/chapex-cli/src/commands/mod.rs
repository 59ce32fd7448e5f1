pub mod extract;
pub mod prompt;
pub mod toc;
