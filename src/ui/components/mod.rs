pub mod layout;
pub mod terminal;
