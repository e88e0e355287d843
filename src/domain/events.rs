use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Book, BookId, User, UserId};

/// イベント：書籍がカタログに登録された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookAdded {
    pub book: Book,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

/// イベント：利用者が登録された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user: User,
    pub registered_at: DateTime<Utc>,
}

/// イベント：書籍が入荷された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRestocked {
    pub book_id: BookId,
    pub quantity: u32,
    pub stock_after: u32,
    pub restocked_at: DateTime<Utc>,
}

/// イベント：書籍が貸し出された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookBorrowed {
    pub user_id: UserId,
    pub book_id: BookId,
    /// 貸出後の残り在庫
    pub stock_after: u32,
    pub borrowed_at: DateTime<Utc>,
}

/// イベント：書籍が返却された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookReturned {
    pub user_id: UserId,
    pub book_id: BookId,
    /// 返却後の在庫
    pub stock_after: u32,
    pub returned_at: DateTime<Utc>,
}

/// ドメインイベント統合型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    BookAdded(BookAdded),
    UserRegistered(UserRegistered),
    BookRestocked(BookRestocked),
    BookBorrowed(BookBorrowed),
    BookReturned(BookReturned),
}
