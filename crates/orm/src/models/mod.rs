pub mod file;
pub mod user;

pub use file::{CreateFile, StoredFile, UpdateFile};
pub use user::{CreateUser, UpdateUser, User, UserRole};
