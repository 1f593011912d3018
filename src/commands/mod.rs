pub mod narration;
pub mod settings;
