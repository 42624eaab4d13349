use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: u64,
    pub name: String,
    pub country: String,
    pub birth_year: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: u64,
    pub title: String,
    pub author_id: u64,
    pub year: i64,
    pub genre: String,
    pub isbn: String,
}

/// Validated author body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorInput {
    pub name: String,
    pub country: String,
    pub birth_year: i64,
}

/// Validated book body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookInput {
    pub title: String,
    pub author_id: u64,
    pub year: i64,
    pub genre: String,
    pub isbn: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookWithAuthor {
    #[serde(flatten)]
    pub book: Book,
    pub author: Option<Author>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorWithBooks {
    #[serde(flatten)]
    pub author: Author,
    pub books: Vec<Book>,
}

#[derive(Debug, Default)]
struct CatalogData {
    authors: Vec<Author>,
    books: Vec<Book>,
}

impl CatalogData {
    fn author(&self, id: u64) -> Option<&Author> {
        self.authors.iter().find(|a| a.id == id)
    }

    fn with_author(&self, book: &Book) -> BookWithAuthor {
        BookWithAuthor {
            book: book.clone(),
            author: self.author(book.author_id).cloned(),
        }
    }
}

/// In-memory authors and books, injected into the handlers through `AppState`.
#[derive(Debug, Default)]
pub struct CatalogStore {
    data: RwLock<CatalogData>,
}

impl CatalogStore {
    pub fn new(authors: Vec<Author>, books: Vec<Book>) -> Self {
        Self {
            data: RwLock::new(CatalogData { authors, books }),
        }
    }

    pub fn seeded() -> Self {
        let author = |id, name: &str, country: &str, birth_year| Author {
            id,
            name: name.to_string(),
            country: country.to_string(),
            birth_year,
        };
        let book = |id, title: &str, author_id, year, genre: &str, isbn: &str| Book {
            id,
            title: title.to_string(),
            author_id,
            year,
            genre: genre.to_string(),
            isbn: isbn.to_string(),
        };

        Self::new(
            vec![
                author(1, "J.K. Rowling", "UK", 1965),
                author(2, "George Orwell", "UK", 1903),
                author(3, "Haruki Murakami", "Japan", 1949),
                author(4, "Ernest Hemingway", "USA", 1899),
            ],
            vec![
                book(1, "Harry Potter and the Philosopher's Stone", 1, 1997, "Fantasy", "978-0747532699"),
                book(2, "Harry Potter and the Chamber of Secrets", 1, 1998, "Fantasy", "978-0747538493"),
                book(3, "1984", 2, 1949, "Dystopian", "978-0451524935"),
                book(4, "Animal Farm", 2, 1945, "Satire", "978-0451526342"),
                book(5, "Norwegian Wood", 3, 1987, "Fiction", "978-0375704024"),
            ],
        )
    }

    // ------------------------------------------------------------------
    // Authors
    // ------------------------------------------------------------------

    pub async fn list_authors(&self, country: Option<&str>) -> Vec<Author> {
        let data = self.data.read().await;
        data.authors
            .iter()
            .filter(|a| country.is_none_or(|c| a.country == c))
            .cloned()
            .collect()
    }

    pub async fn search_authors(&self, query: &str) -> Vec<Author> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Vec::new();
        }
        let data = self.data.read().await;
        data.authors
            .iter()
            .filter(|a| a.name.to_lowercase().contains(&q))
            .cloned()
            .collect()
    }

    pub async fn author_with_books(&self, id: u64) -> Option<AuthorWithBooks> {
        let data = self.data.read().await;
        let author = data.author(id)?.clone();
        let books = data.books.iter().filter(|b| b.author_id == id).cloned().collect();
        Some(AuthorWithBooks { author, books })
    }

    pub async fn create_author(&self, input: AuthorInput) -> Author {
        let mut data = self.data.write().await;
        let id = data.authors.iter().map(|a| a.id).max().unwrap_or(0) + 1;
        let author = Author {
            id,
            name: input.name,
            country: input.country,
            birth_year: input.birth_year,
        };
        data.authors.push(author.clone());
        author
    }

    pub async fn update_author(&self, id: u64, input: AuthorInput) -> AppResult<Author> {
        let mut data = self.data.write().await;
        let author = data
            .authors
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(author_not_found)?;

        author.name = input.name;
        author.country = input.country;
        author.birth_year = input.birth_year;
        Ok(author.clone())
    }

    /// Refuses to remove an author that still has books.
    pub async fn delete_author(&self, id: u64) -> AppResult<Author> {
        let mut data = self.data.write().await;
        if data.books.iter().any(|b| b.author_id == id) {
            return Err(AppError::Conflict(
                "Cannot delete author because they still have books".into(),
            ));
        }

        let idx = data
            .authors
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(author_not_found)?;
        Ok(data.authors.remove(idx))
    }

    // ------------------------------------------------------------------
    // Books
    // ------------------------------------------------------------------

    /// Books filtered by genre (case-insensitive), with their author attached.
    pub async fn list_books(&self, genre: Option<&str>) -> Vec<BookWithAuthor> {
        let genre = genre.map(str::to_lowercase);
        let data = self.data.read().await;
        data.books
            .iter()
            .filter(|b| genre.as_deref().is_none_or(|g| b.genre.to_lowercase() == g))
            .map(|b| data.with_author(b))
            .collect()
    }

    pub async fn search_books(&self, query: &str) -> Vec<BookWithAuthor> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Vec::new();
        }
        let data = self.data.read().await;
        data.books
            .iter()
            .filter(|b| b.title.to_lowercase().contains(&q))
            .map(|b| data.with_author(b))
            .collect()
    }

    pub async fn get_book(&self, id: u64) -> Option<BookWithAuthor> {
        let data = self.data.read().await;
        data.books.iter().find(|b| b.id == id).map(|b| data.with_author(b))
    }

    pub async fn create_book(&self, input: BookInput) -> AppResult<BookWithAuthor> {
        let mut data = self.data.write().await;
        if data.author(input.author_id).is_none() {
            return Err(invalid_author());
        }

        let id = data.books.iter().map(|b| b.id).max().unwrap_or(0) + 1;
        let book = Book {
            id,
            title: input.title,
            author_id: input.author_id,
            year: input.year,
            genre: input.genre,
            isbn: input.isbn,
        };
        data.books.push(book.clone());
        Ok(data.with_author(&book))
    }

    pub async fn update_book(&self, id: u64, input: BookInput) -> AppResult<BookWithAuthor> {
        let mut data = self.data.write().await;
        if !data.books.iter().any(|b| b.id == id) {
            return Err(book_not_found());
        }
        if data.author(input.author_id).is_none() {
            return Err(invalid_author());
        }

        let book = data
            .books
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(book_not_found)?;
        book.title = input.title;
        book.author_id = input.author_id;
        book.year = input.year;
        book.genre = input.genre;
        book.isbn = input.isbn;

        let book = book.clone();
        Ok(data.with_author(&book))
    }

    pub async fn delete_book(&self, id: u64) -> AppResult<BookWithAuthor> {
        let mut data = self.data.write().await;
        let idx = data
            .books
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(book_not_found)?;
        let book = data.books.remove(idx);
        Ok(data.with_author(&book))
    }
}

pub fn author_not_found() -> AppError {
    AppError::NotFound("Author not found".into())
}

pub fn book_not_found() -> AppError {
    AppError::NotFound("Book not found".into())
}

fn invalid_author() -> AppError {
    AppError::Validation("Invalid authorId".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(author_id: u64) -> BookInput {
        BookInput {
            title: "Kafka on the Shore".into(),
            author_id,
            year: 2002,
            genre: "Fiction".into(),
            isbn: "978-1400079278".into(),
        }
    }

    #[tokio::test]
    async fn author_with_books_cannot_be_deleted() {
        let store = CatalogStore::seeded();
        let before_books = store.list_books(None).await.len();

        let err = store.delete_author(2).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(store.author_with_books(2).await.is_some());
        assert_eq!(store.list_books(None).await.len(), before_books);

        assert_eq!(store.delete_author(4).await.unwrap().name, "Ernest Hemingway");
        assert!(matches!(store.delete_author(4).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn books_require_known_author() {
        let store = CatalogStore::seeded();
        assert!(matches!(store.create_book(input(99)).await, Err(AppError::Validation(_))));

        let created = store.create_book(input(3)).await.unwrap();
        assert_eq!(created.book.id, 6);
        assert_eq!(created.author.unwrap().name, "Haruki Murakami");
        assert_eq!(store.author_with_books(3).await.unwrap().books.len(), 2);
    }

    #[tokio::test]
    async fn update_checks_book_before_author() {
        let store = CatalogStore::seeded();
        assert!(matches!(store.update_book(42, input(99)).await, Err(AppError::NotFound(_))));
        assert!(matches!(store.update_book(5, input(99)).await, Err(AppError::Validation(_))));
        assert_eq!(store.update_book(5, input(3)).await.unwrap().book.title, "Kafka on the Shore");
    }

    #[tokio::test]
    async fn genre_filter_and_search_ignore_case() {
        let store = CatalogStore::seeded();
        assert_eq!(store.list_books(Some("fantasy")).await.len(), 2);
        assert_eq!(store.search_books("HARRY").await.len(), 2);
        assert!(store.search_books("   ").await.is_empty());
        assert_eq!(store.list_authors(Some("UK")).await.len(), 2);
        assert_eq!(store.search_authors("orwell").await[0].id, 2);
    }
}
