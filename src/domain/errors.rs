use std::fmt;

use thiserror::Error;

use super::{Age, BookId, BorrowLimit, PublishState, UserId};

/// 値オブジェクト・エンティティ生成時のバリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 必須項目が空
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// 年齢が負
    #[error("age cannot be negative: {0}")]
    NegativeAge(i64),

    /// 最大貸出冊数が0
    #[error("borrow limit must be at least 1, got {0}")]
    InvalidBorrowLimit(u32),

    /// 貸出中の書籍を持ったまま登録しようとした
    #[error("user '{0}' cannot be registered with outstanding loans")]
    PreexistingLoans(UserId),
}

/// カタログ（書籍・在庫）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// 既に登録済みの書籍ID
    #[error("book '{0}' already exists")]
    DuplicateBook(BookId),

    /// 書籍が存在しない
    #[error("book '{0}' not found")]
    BookNotFound(BookId),

    /// 在庫が負になる調整
    #[error("stock of book '{book_id}' cannot go below zero (stock {stock}, delta {delta})")]
    NegativeStock {
        book_id: BookId,
        stock: u32,
        delta: i64,
    },

    /// 在庫カウンタの上限超過
    #[error("stock of book '{0}' exceeds the counter range")]
    StockOverflow(BookId),
}

/// 会員管理のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MembershipError {
    /// 既に登録済みの利用者ID
    #[error("user '{0}' already exists")]
    DuplicateUser(UserId),

    /// 利用者が存在しない
    #[error("user '{0}' not found")]
    UserNotFound(UserId),

    /// 同じ書籍を既に借りている
    #[error("user '{user_id}' has already borrowed book '{book_id}'")]
    AlreadyBorrowed { user_id: UserId, book_id: BookId },

    /// 最大貸出冊数に達している
    #[error("user '{user_id}' has reached the borrow limit of {limit}")]
    BorrowLimitReached { user_id: UserId, limit: BorrowLimit },

    /// 借りていない書籍を返却しようとした
    #[error("user '{user_id}' has not borrowed book '{book_id}'")]
    NotBorrowed { user_id: UserId, book_id: BookId },

    /// 登録内容が不正
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// 貸出エンジンのエラー
///
/// 貸出・返却・登録のすべての失敗をこの型で返す。
/// どのエラーも現在の状態と引数から決定的に発生し、発生時に状態は変更されない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LendingError {
    #[error("book '{0}' already exists")]
    DuplicateBook(BookId),

    #[error("user '{0}' already exists")]
    DuplicateUser(UserId),

    #[error("book '{0}' not found")]
    BookNotFound(BookId),

    #[error("user '{0}' not found")]
    UserNotFound(UserId),

    #[error("book '{0}' is out of stock")]
    OutOfStock(BookId),

    #[error("stock of book '{book_id}' cannot go below zero (stock {stock}, delta {delta})")]
    NegativeStock {
        book_id: BookId,
        stock: u32,
        delta: i64,
    },

    #[error("user '{user_id}' has already borrowed book '{book_id}'")]
    AlreadyBorrowed { user_id: UserId, book_id: BookId },

    #[error("user '{user_id}' has reached the borrow limit of {limit}")]
    BorrowLimitReached { user_id: UserId, limit: BorrowLimit },

    #[error("user '{user_id}' (age {age}) is too young for book '{book_id}' (age limit {age_limit})")]
    AgeRestricted {
        user_id: UserId,
        book_id: BookId,
        age: Age,
        age_limit: Age,
    },

    #[error("user '{user_id}' has not borrowed book '{book_id}'")]
    NotBorrowed { user_id: UserId, book_id: BookId },

    #[error("book '{book_id}' is not available for lending: {state}")]
    NotPublished { book_id: BookId, state: PublishState },

    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

/// エラー種別（呼び出し側での分岐用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DuplicateBook,
    DuplicateUser,
    BookNotFound,
    UserNotFound,
    OutOfStock,
    NegativeStock,
    AlreadyBorrowed,
    BorrowLimitReached,
    AgeRestricted,
    NotBorrowed,
    NotPublished,
    InvalidInput,
    InvariantViolation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DuplicateBook => "DUPLICATE_BOOK",
            ErrorKind::DuplicateUser => "DUPLICATE_USER",
            ErrorKind::BookNotFound => "BOOK_NOT_FOUND",
            ErrorKind::UserNotFound => "USER_NOT_FOUND",
            ErrorKind::OutOfStock => "OUT_OF_STOCK",
            ErrorKind::NegativeStock => "NEGATIVE_STOCK",
            ErrorKind::AlreadyBorrowed => "ALREADY_BORROWED",
            ErrorKind::BorrowLimitReached => "BORROW_LIMIT_REACHED",
            ErrorKind::AgeRestricted => "AGE_RESTRICTED",
            ErrorKind::NotBorrowed => "NOT_BORROWED",
            ErrorKind::NotPublished => "NOT_PUBLISHED",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::InvariantViolation => "INVARIANT_VIOLATION",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LendingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LendingError::DuplicateBook(_) => ErrorKind::DuplicateBook,
            LendingError::DuplicateUser(_) => ErrorKind::DuplicateUser,
            LendingError::BookNotFound(_) => ErrorKind::BookNotFound,
            LendingError::UserNotFound(_) => ErrorKind::UserNotFound,
            LendingError::OutOfStock(_) => ErrorKind::OutOfStock,
            LendingError::NegativeStock { .. } => ErrorKind::NegativeStock,
            LendingError::AlreadyBorrowed { .. } => ErrorKind::AlreadyBorrowed,
            LendingError::BorrowLimitReached { .. } => ErrorKind::BorrowLimitReached,
            LendingError::AgeRestricted { .. } => ErrorKind::AgeRestricted,
            LendingError::NotBorrowed { .. } => ErrorKind::NotBorrowed,
            LendingError::NotPublished { .. } => ErrorKind::NotPublished,
            LendingError::InvalidInput(_) => ErrorKind::InvalidInput,
            LendingError::InvariantViolation(_) => ErrorKind::InvariantViolation,
        }
    }
}

impl From<CatalogError> for LendingError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::DuplicateBook(id) => LendingError::DuplicateBook(id),
            CatalogError::BookNotFound(id) => LendingError::BookNotFound(id),
            CatalogError::NegativeStock {
                book_id,
                stock,
                delta,
            } => LendingError::NegativeStock {
                book_id,
                stock,
                delta,
            },
            CatalogError::StockOverflow(id) => LendingError::InvariantViolation(format!(
                "stock of book '{id}' exceeds the counter range"
            )),
        }
    }
}

impl From<MembershipError> for LendingError {
    fn from(err: MembershipError) -> Self {
        match err {
            MembershipError::DuplicateUser(id) => LendingError::DuplicateUser(id),
            MembershipError::UserNotFound(id) => LendingError::UserNotFound(id),
            MembershipError::AlreadyBorrowed { user_id, book_id } => {
                LendingError::AlreadyBorrowed { user_id, book_id }
            }
            MembershipError::BorrowLimitReached { user_id, limit } => {
                LendingError::BorrowLimitReached { user_id, limit }
            }
            MembershipError::NotBorrowed { user_id, book_id } => {
                LendingError::NotBorrowed { user_id, book_id }
            }
            MembershipError::Invalid(err) => LendingError::InvalidInput(err),
        }
    }
}
