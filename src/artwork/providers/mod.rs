pub mod catalog;
pub mod extractor;
pub mod search;

pub use catalog::find_album_page;
pub use extractor::{extract_animated, extract_still};
pub use search::search_album_art;
