use libsql::Connection;
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Borrowing {
    pub id: i64,
    pub book_id: i64,
    pub member_id: i64,
    pub borrow_date: String,
    pub return_date: Option<String>,
}

impl Borrowing {
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }
}

/// A borrowing joined with the book title and member name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowingDetail {
    pub id: i64,
    pub book: String,
    pub member: String,
    pub borrow_date: String,
    pub return_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowedBook {
    pub title: String,
    pub author: String,
    pub borrow_date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBook {
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMember {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BorrowRequest {
    #[serde(alias = "bookId")]
    pub book_id: i64,
    #[serde(alias = "memberId")]
    pub member_id: i64,
}

const BORROWING_DETAIL_SELECT: &str = r#"
    SELECT
        borrowings.id,
        books.title AS book,
        members.name AS member,
        borrowings.borrow_date,
        borrowings.return_date
    FROM borrowings
    JOIN books ON borrowings.book_id = books.id
    JOIN members ON borrowings.member_id = members.id
"#;

pub struct Library<'a> {
    db: &'a Database,
}

impl<'a> Library<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn conn(&self) -> &Connection {
        self.db.connection()
    }

    // ------------------------------------------------------------------
    // Books
    // ------------------------------------------------------------------

    pub async fn all_books(&self) -> AppResult<Vec<Book>> {
        self.query_books("SELECT id, title, author, available FROM books ORDER BY id", ())
            .await
    }

    pub async fn available_books(&self) -> AppResult<Vec<Book>> {
        self.query_books(
            "SELECT id, title, author, available FROM books WHERE available = 1 ORDER BY id",
            (),
        )
        .await
    }

    pub async fn search_books(&self, keyword: &str) -> AppResult<Vec<Book>> {
        let pattern = format!("%{}%", keyword.trim());
        self.query_books(
            "SELECT id, title, author, available FROM books WHERE title LIKE ? OR author LIKE ? ORDER BY id",
            libsql::params![pattern.clone(), pattern],
        )
        .await
    }

    pub async fn get_book(&self, id: i64) -> AppResult<Option<Book>> {
        let mut books = self
            .query_books(
                "SELECT id, title, author, available FROM books WHERE id = ?",
                libsql::params![id],
            )
            .await?;
        Ok(books.pop())
    }

    pub async fn add_book(&self, input: CreateBook) -> AppResult<Book> {
        let title = input.title.trim();
        let author = input.author.trim();
        if title.is_empty() || author.is_empty() {
            return Err(AppError::Validation("Title and author are required".into()));
        }

        let query = r#"
            INSERT INTO books (title, author, available)
            VALUES (?, ?, 1)
            RETURNING id, title, author, available
        "#;
        let mut rows = self.conn().query(query, libsql::params![title, author]).await?;

        match rows.next().await? {
            Some(row) => row_to_book(&row),
            None => Err(anyhow::anyhow!("failed to create book").into()),
        }
    }

    async fn query_books(&self, sql: &str, params: impl libsql::params::IntoParams) -> AppResult<Vec<Book>> {
        let mut rows = self.conn().query(sql, params).await?;
        let mut books = Vec::new();
        while let Some(row) = rows.next().await? {
            books.push(row_to_book(&row)?);
        }
        Ok(books)
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    pub async fn all_members(&self) -> AppResult<Vec<Member>> {
        let mut rows = self
            .conn()
            .query("SELECT id, name, email, phone FROM members ORDER BY id", ())
            .await?;
        let mut members = Vec::new();
        while let Some(row) = rows.next().await? {
            members.push(row_to_member(&row)?);
        }
        Ok(members)
    }

    pub async fn get_member(&self, id: i64) -> AppResult<Option<Member>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, name, email, phone FROM members WHERE id = ?",
                libsql::params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_member(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn add_member(&self, input: CreateMember) -> AppResult<Member> {
        let name = input.name.trim();
        let email = input.email.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Name is required".into()));
        }
        if !email.contains('@') {
            return Err(AppError::Validation("Valid email is required".into()));
        }

        let mut existing = self
            .conn()
            .query("SELECT 1 FROM members WHERE email = ?", libsql::params![email])
            .await?;
        if existing.next().await?.is_some() {
            return Err(AppError::Conflict(format!("Member with email {email} already exists")));
        }

        let phone = input.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
        let query = r#"
            INSERT INTO members (name, email, phone)
            VALUES (?, ?, ?)
            RETURNING id, name, email, phone
        "#;
        let mut rows = self.conn().query(query, libsql::params![name, email, phone]).await?;

        match rows.next().await? {
            Some(row) => row_to_member(&row),
            None => Err(anyhow::anyhow!("failed to create member").into()),
        }
    }

    /// Books the member currently holds (open borrowings only).
    pub async fn borrowed_books(&self, member_id: i64) -> AppResult<Vec<BorrowedBook>> {
        let query = r#"
            SELECT books.title, books.author, borrowings.borrow_date
            FROM borrowings
            JOIN books ON borrowings.book_id = books.id
            WHERE borrowings.member_id = ? AND borrowings.return_date IS NULL
            ORDER BY borrowings.id
        "#;
        let mut rows = self.conn().query(query, libsql::params![member_id]).await?;
        let mut books = Vec::new();
        while let Some(row) = rows.next().await? {
            books.push(BorrowedBook {
                title: row.get(0)?,
                author: row.get(1)?,
                borrow_date: row.get(2)?,
            });
        }
        Ok(books)
    }

    // ------------------------------------------------------------------
    // Borrowings
    // ------------------------------------------------------------------

    pub async fn all_borrowings(&self) -> AppResult<Vec<BorrowingDetail>> {
        let query = format!("{BORROWING_DETAIL_SELECT} ORDER BY borrowings.id");
        self.query_borrowing_details(&query).await
    }

    pub async fn unreturned(&self) -> AppResult<Vec<BorrowingDetail>> {
        let query =
            format!("{BORROWING_DETAIL_SELECT} WHERE borrowings.return_date IS NULL ORDER BY borrowings.id");
        self.query_borrowing_details(&query).await
    }

    pub async fn get_borrowing(&self, id: i64) -> AppResult<Option<Borrowing>> {
        let query = r#"
            SELECT id, book_id, member_id, borrow_date, return_date
            FROM borrowings WHERE id = ?
        "#;
        let mut rows = self.conn().query(query, libsql::params![id]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_borrowing(&row)?)),
            None => Ok(None),
        }
    }

    /// Lends a book to a member. The borrowing row and the availability flag
    /// are written in one transaction.
    pub async fn borrow(&self, book_id: i64, member_id: i64) -> AppResult<Borrowing> {
        let _guard = self.db.tx_lock().lock().await;

        self.conn().execute("BEGIN TRANSACTION", ()).await?;

        match self.borrow_internal(book_id, member_id).await {
            Ok(borrowing) => {
                self.conn().execute("COMMIT", ()).await?;
                tracing::info!(book_id, member_id, borrowing_id = borrowing.id, "book borrowed");
                Ok(borrowing)
            }
            Err(e) => {
                let _ = self.conn().execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn borrow_internal(&self, book_id: i64, member_id: i64) -> AppResult<Borrowing> {
        let book = self
            .get_book(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book #{book_id} not found")))?;

        if self.get_member(member_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Member #{member_id} not found")));
        }

        let mut open = self
            .conn()
            .query(
                "SELECT 1 FROM borrowings WHERE book_id = ? AND return_date IS NULL",
                libsql::params![book_id],
            )
            .await?;
        if !book.available || open.next().await?.is_some() {
            return Err(AppError::Conflict(format!("Book #{book_id} is already borrowed")));
        }

        let insert = r#"
            INSERT INTO borrowings (book_id, member_id, borrow_date, return_date)
            VALUES (?, ?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), NULL)
            RETURNING id, book_id, member_id, borrow_date, return_date
        "#;
        let mut rows = self.conn().query(insert, libsql::params![book_id, member_id]).await?;
        let borrowing = match rows.next().await? {
            Some(row) => row_to_borrowing(&row)?,
            None => return Err(anyhow::anyhow!("failed to create borrowing").into()),
        };

        self.conn()
            .execute("UPDATE books SET available = 0 WHERE id = ?", libsql::params![book_id])
            .await?;

        Ok(borrowing)
    }

    /// Closes a borrowing and marks its book available again, atomically.
    pub async fn return_book(&self, borrowing_id: i64) -> AppResult<Borrowing> {
        let _guard = self.db.tx_lock().lock().await;

        self.conn().execute("BEGIN TRANSACTION", ()).await?;

        match self.return_book_internal(borrowing_id).await {
            Ok(borrowing) => {
                self.conn().execute("COMMIT", ()).await?;
                tracing::info!(borrowing_id, book_id = borrowing.book_id, "book returned");
                Ok(borrowing)
            }
            Err(e) => {
                let _ = self.conn().execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn return_book_internal(&self, borrowing_id: i64) -> AppResult<Borrowing> {
        let borrowing = self
            .get_borrowing(borrowing_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrowing #{borrowing_id} not found")))?;

        if !borrowing.is_open() {
            return Err(AppError::Conflict(format!(
                "Borrowing #{borrowing_id} has already been returned"
            )));
        }

        let update = r#"
            UPDATE borrowings
            SET return_date = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE id = ?
            RETURNING id, book_id, member_id, borrow_date, return_date
        "#;
        let mut rows = self.conn().query(update, libsql::params![borrowing_id]).await?;
        let updated = match rows.next().await? {
            Some(row) => row_to_borrowing(&row)?,
            None => return Err(anyhow::anyhow!("failed to close borrowing #{borrowing_id}").into()),
        };

        self.conn()
            .execute(
                "UPDATE books SET available = 1 WHERE id = ?",
                libsql::params![borrowing.book_id],
            )
            .await?;

        Ok(updated)
    }

    async fn query_borrowing_details(&self, sql: &str) -> AppResult<Vec<BorrowingDetail>> {
        let mut rows = self.conn().query(sql, ()).await?;
        let mut details = Vec::new();
        while let Some(row) = rows.next().await? {
            details.push(BorrowingDetail {
                id: row.get(0)?,
                book: row.get(1)?,
                member: row.get(2)?,
                borrow_date: row.get(3)?,
                return_date: row.get(4)?,
            });
        }
        Ok(details)
    }
}

fn row_to_book(row: &libsql::Row) -> AppResult<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        available: row.get::<i64>(3)? != 0,
    })
}

fn row_to_member(row: &libsql::Row) -> AppResult<Member> {
    Ok(Member {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
    })
}

fn row_to_borrowing(row: &libsql::Row) -> AppResult<Borrowing> {
    Ok(Borrowing {
        id: row.get(0)?,
        book_id: row.get(1)?,
        member_id: row.get(2)?,
        borrow_date: row.get(3)?,
        return_date: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> (Database, i64, i64) {
        let db = Database::in_memory().await.unwrap();
        let lib = Library::new(&db);
        let book = lib
            .add_book(CreateBook {
                title: "The Hobbit".into(),
                author: "J.R.R. Tolkien".into(),
            })
            .await
            .unwrap();
        let member = lib
            .add_member(CreateMember {
                name: "Chatchai".into(),
                email: "chatchai@example.com".into(),
                phone: None,
            })
            .await
            .unwrap();
        (db, book.id, member.id)
    }

    #[tokio::test]
    async fn borrow_then_return_restores_availability() {
        let (db, book_id, member_id) = setup().await;
        let lib = Library::new(&db);

        let borrowing = lib.borrow(book_id, member_id).await.unwrap();
        assert!(borrowing.is_open());
        assert!(!lib.get_book(book_id).await.unwrap().unwrap().available);
        assert_eq!(lib.borrowed_books(member_id).await.unwrap().len(), 1);

        let returned = lib.return_book(borrowing.id).await.unwrap();
        assert!(returned.return_date.is_some());
        assert!(lib.get_book(book_id).await.unwrap().unwrap().available);
        assert!(lib.unreturned().await.unwrap().is_empty());
        assert!(lib.borrowed_books(member_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn return_of_unknown_borrowing_changes_nothing() {
        let (db, book_id, member_id) = setup().await;
        let lib = Library::new(&db);
        lib.borrow(book_id, member_id).await.unwrap();
        let before = lib.all_borrowings().await.unwrap();

        let err = lib.return_book(999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let after = lib.all_borrowings().await.unwrap();
        assert_eq!(before.len(), after.len());
        assert!(after[0].return_date.is_none());
        assert!(!lib.get_book(book_id).await.unwrap().unwrap().available);
    }

    #[tokio::test]
    async fn double_borrow_is_rejected() {
        let (db, book_id, member_id) = setup().await;
        let lib = Library::new(&db);
        lib.borrow(book_id, member_id).await.unwrap();

        let err = lib.borrow(book_id, member_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(lib.unreturned().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_return_is_rejected() {
        let (db, book_id, member_id) = setup().await;
        let lib = Library::new(&db);
        let borrowing = lib.borrow(book_id, member_id).await.unwrap();
        let first = lib.return_book(borrowing.id).await.unwrap();

        let err = lib.return_book(borrowing.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(lib.get_borrowing(borrowing.id).await.unwrap().unwrap(), first);
    }

    #[tokio::test]
    async fn borrow_requires_existing_book_and_member() {
        let (db, book_id, member_id) = setup().await;
        let lib = Library::new(&db);

        assert!(matches!(lib.borrow(42, member_id).await, Err(AppError::NotFound(_))));
        assert!(matches!(lib.borrow(book_id, 42).await, Err(AppError::NotFound(_))));
        assert!(lib.all_borrowings().await.unwrap().is_empty());
        assert!(lib.get_book(book_id).await.unwrap().unwrap().available);
    }

    #[tokio::test]
    async fn search_matches_title_or_author() {
        let (db, _, _) = setup().await;
        let lib = Library::new(&db);
        lib.add_book(CreateBook {
            title: "1984".into(),
            author: "George Orwell".into(),
        })
        .await
        .unwrap();

        assert_eq!(lib.search_books("tolkien").await.unwrap().len(), 1);
        assert_eq!(lib.search_books("198").await.unwrap()[0].author, "George Orwell");
        assert_eq!(lib.available_books().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn member_emails_are_unique_and_validated() {
        let (db, _, _) = setup().await;
        let lib = Library::new(&db);

        let dup = lib
            .add_member(CreateMember {
                name: "Someone".into(),
                email: "chatchai@example.com".into(),
                phone: Some("081".into()),
            })
            .await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));

        let bad = lib
            .add_member(CreateMember {
                name: "Someone".into(),
                email: "nope".into(),
                phone: None,
            })
            .await;
        assert!(matches!(bad, Err(AppError::Validation(_))));
        assert_eq!(lib.all_members().await.unwrap().len(), 1);
    }
}
