//! Catalogue management service (authors and books)

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult, EntityKind},
    models::{
        author::{CreateAuthor, UpdateAuthor},
        book::{CreateBook, UpdateBook},
        Author, Book, Page, PageQuery,
    },
    repository::Repository,
};

use super::cache::{CacheKey, Cached, Caches};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    caches: Caches,
}

impl CatalogService {
    pub fn new(repository: Repository, caches: Caches) -> Self {
        Self { repository, caches }
    }

    // =========================================================================
    // AUTHORS
    // =========================================================================

    pub async fn find_author(&self, id: i32) -> AppResult<Option<Arc<Author>>> {
        let store = self.repository.authors.clone();
        self.caches
            .authors
            .get_or_load(CacheKey::Id(id), || async move { store.find_by_id(id).await })
            .await
    }

    pub async fn get_author(&self, id: i32) -> AppResult<Author> {
        self.find_author(id)
            .await?
            .map(|a| a.as_ref().clone())
            .ok_or_else(|| AppError::not_found(EntityKind::Author, id))
    }

    pub async fn list_authors(&self, page: &PageQuery) -> AppResult<Page<Author>> {
        let (authors, total) = self.repository.authors.list(page).await?;
        Ok(Page::new(authors, total, page))
    }

    pub async fn create_author(&self, author: CreateAuthor) -> AppResult<Author> {
        self.repository.authors.insert(&author).await
    }

    pub async fn update_author(&self, id: i32, update: UpdateAuthor) -> AppResult<Author> {
        let current = self.get_author(id).await?;
        let updated = current.merged(&update);
        if updated == current {
            return Ok(updated);
        }

        let saved = self.repository.authors.update(&updated).await?;
        self.caches.authors.refresh(&saved.cache_keys(), saved.clone()).await?;
        Ok(saved)
    }

    pub async fn delete_author(&self, id: i32) -> AppResult<()> {
        let author = self.get_author(id).await?;
        self.repository.authors.delete(id).await?;
        self.caches.authors.evict(&author.cache_keys()).await
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    pub async fn find_book(&self, id: i32) -> AppResult<Option<Arc<Book>>> {
        let store = self.repository.books.clone();
        self.caches
            .books
            .get_or_load(CacheKey::Id(id), || async move { store.find_by_id(id).await })
            .await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.find_book(id)
            .await?
            .map(|b| b.as_ref().clone())
            .ok_or_else(|| AppError::not_found(EntityKind::Book, id))
    }

    pub async fn list_books(&self, page: &PageQuery) -> AppResult<Page<Book>> {
        let (books, total) = self.repository.books.list(page).await?;
        Ok(Page::new(books, total, page))
    }

    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        if let Some(author_id) = book.author_id {
            self.get_author(author_id).await?;
        }
        self.repository.books.insert(&book).await
    }

    pub async fn update_book(&self, id: i32, update: UpdateBook) -> AppResult<Book> {
        let current = self.get_book(id).await?;
        let updated = current.merged(&update);
        if updated == current {
            return Ok(updated);
        }

        if let Some(author_id) = updated.author_id {
            self.get_author(author_id).await?;
        }

        let saved = self.repository.books.update(&updated).await?;
        self.caches.books.refresh(&saved.cache_keys(), saved.clone()).await?;
        Ok(saved)
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        let book = self.get_book(id).await?;
        self.repository.books.delete(id).await?;
        self.caches.books.evict(&book.cache_keys()).await
    }
}
