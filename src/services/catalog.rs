//! Catalog management service

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook},
    repository::Repository,
};

use super::holds::HoldsService;

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    holds: HoldsService,
}

impl CatalogService {
    pub fn new(repository: Repository, holds: HoldsService) -> Self {
        Self { repository, holds }
    }

    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        self.repository.books.list(query).await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// New books start with every copy available
    pub async fn create_book(&self, book: &CreateBook) -> AppResult<Book> {
        let created = self.repository.books.create(book).await?;
        tracing::info!(book_id = created.id, title = %created.title, copies = created.total_copies, "Book created");
        Ok(created)
    }

    /// Change the number of owned copies. Available copies move by the same
    /// delta. Copies on loan or reserved by READY holds cannot be removed.
    /// New copies go to the hold queue.
    pub async fn set_total_copies(&self, id: i32, total_copies: i32) -> AppResult<Book> {
        if total_copies < 0 {
            return Err(AppError::Validation("total_copies cannot be negative".to_string()));
        }

        let previous = self.repository.books.get_by_id(id).await?;
        let book = self
            .repository
            .books
            .set_total_copies(id, total_copies)
            .await?
            .ok_or_else(|| {
                AppError::BusinessRule("Cannot remove copies that are on loan or reserved for pickup".to_string())
            })?;
        tracing::info!(
            book_id = id,
            from = previous.total_copies,
            to = book.total_copies,
            available = book.available_copies,
            "Book copies changed"
        );

        if book.total_copies > previous.total_copies {
            loop {
                match self.holds.promote_next_hold(id).await {
                    Ok(Some(_)) => continue,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(book_id = id, error = %e, "Hold promotion failed");
                        break;
                    }
                }
            }
        }

        self.repository.books.get_by_id(id).await
    }
}
