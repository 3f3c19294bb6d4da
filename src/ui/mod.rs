pub mod screen;
pub mod widget;

pub use screen::{ScreenConfig, run};
