pub mod dialogue;
pub mod session;
pub mod slots;
pub mod tool;
pub mod transcript;
