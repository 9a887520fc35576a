pub mod token;
pub mod view;

pub use token::{ConsumeResult, NewToken, Page, Stats, TokenRecord, TokenState};
pub use view::ViewResult;
