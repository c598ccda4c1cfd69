pub mod search;
pub mod show;

pub use search::ShowSearch;
pub use show::{ShowRow, ShowScrape, ShowScraper};
