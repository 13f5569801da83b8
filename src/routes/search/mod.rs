mod handler;
mod model;

pub use handler::search_phones;
pub use model::SearchQuery;
