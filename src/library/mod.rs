//! Library lending system.
//!
//! Books, members and the borrowings that link them, stored in the shared
//! SQLite database. A book is available exactly when it has no open borrowing
//! (`return_date IS NULL`); `borrow` and `return_book` keep the two tables in
//! step inside a single transaction.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .nest("/api/library", library::routes())
//!     .with_state(app_state);
//!
//! let lib = library::Library::new(&db);
//! let borrowing = lib.borrow(book_id, member_id).await?;
//! lib.return_book(borrowing.id).await?;
//! ```

mod handler;
mod routes;
mod store;

pub use routes::routes;
pub use store::*;
