pub mod apply;
pub mod colour_merge;
pub mod preprocess;
