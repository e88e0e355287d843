pub mod book;
pub mod catalog;
pub mod errors;
pub mod events;
pub mod membership;
pub mod user;
pub mod value_objects;

pub use book::Book;
pub use catalog::{Catalog, CatalogEntry};
pub use errors::*;
pub use events::*;
pub use membership::Membership;
pub use user::User;
pub use value_objects::*;
