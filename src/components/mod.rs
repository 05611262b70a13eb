pub mod colors;
pub mod history;
pub mod legend;
pub mod registry;
pub mod selection;
pub mod tools;
