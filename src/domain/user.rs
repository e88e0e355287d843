use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Age, Book, BookId, BorrowLimit, UserId, ValidationError};

/// 利用者
///
/// 貸出中の書籍集合は貸出エンジンの貸出・返却遷移を通じてのみ変化する。
/// 不変条件：集合のサイズは`max_borrowed`以下、重複なし（集合で保証）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UserRecord")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub age: Age,
    pub max_borrowed: BorrowLimit,
    pub(crate) borrowed: BTreeSet<BookId>,
}

/// デシリアライズ用の生データ（`User::new`の検証を通してから`User`にする）
#[derive(Deserialize)]
struct UserRecord {
    id: UserId,
    name: String,
    age: Age,
    #[serde(default)]
    max_borrowed: BorrowLimit,
    #[serde(default)]
    borrowed: BTreeSet<BookId>,
}

impl TryFrom<UserRecord> for User {
    type Error = ValidationError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        let mut user = User::new(record.id, record.name, record.age)?
            .with_max_borrowed(record.max_borrowed);
        user.borrowed = record.borrowed;
        Ok(user)
    }
}

impl User {
    /// 貸出なし・デフォルト上限（5冊）の利用者を作成する
    ///
    /// # エラー
    /// 名前が空の場合は`ValidationError::EmptyField`を返す
    pub fn new(id: UserId, name: impl Into<String>, age: Age) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name"));
        }

        Ok(Self {
            id,
            name,
            age,
            max_borrowed: BorrowLimit::default(),
            borrowed: BTreeSet::new(),
        })
    }

    pub fn with_max_borrowed(self, max_borrowed: BorrowLimit) -> Self {
        Self {
            max_borrowed,
            ..self
        }
    }

    /// 現在借りている書籍ID（昇順）
    pub fn borrowed_books(&self) -> impl Iterator<Item = &BookId> {
        self.borrowed.iter()
    }

    pub fn borrowed_count(&self) -> usize {
        self.borrowed.len()
    }

    pub fn has_borrowed(&self, book_id: &BookId) -> bool {
        self.borrowed.contains(book_id)
    }

    pub fn can_borrow_more(&self) -> bool {
        !self.max_borrowed.is_reached(self.borrowed.len())
    }

    /// 書籍の年齢制限を満たしているか（制限0は常に満たす）
    pub fn meets_age_limit(&self, book: &Book) -> bool {
        book.age_limit.is_unrestricted() || self.age >= book.age_limit
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (ID: {}, age {}) - borrowed {}/{}",
            self.name,
            self.id,
            self.age,
            self.borrowed.len(),
            self.max_borrowed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(age: i64) -> User {
        User::new(UserId::new("U001").unwrap(), "Alice", Age::new(age).unwrap()).unwrap()
    }

    fn book(age_limit: u32) -> Book {
        Book::new(BookId::new("B001").unwrap(), "Title", "Author")
            .unwrap()
            .with_age_limit(Age::from(age_limit))
    }

    #[test]
    fn test_user_new_defaults() {
        let user = user(30);
        assert_eq!(user.max_borrowed, BorrowLimit::default());
        assert_eq!(user.borrowed_count(), 0);
        assert!(user.can_borrow_more());
    }

    #[test]
    fn test_user_new_rejects_empty_name() {
        let result = User::new(UserId::new("U001").unwrap(), "", Age::from(20));
        assert_eq!(result.unwrap_err(), ValidationError::EmptyField("name"));
    }

    #[test]
    fn test_user_meets_age_limit() {
        assert!(user(10).meets_age_limit(&book(0)));
        assert!(!user(10).meets_age_limit(&book(18)));
        assert!(user(18).meets_age_limit(&book(18)));
        assert!(user(20).meets_age_limit(&book(18)));
    }

    #[test]
    fn test_user_can_borrow_more_respects_limit() {
        let mut user = user(30).with_max_borrowed(BorrowLimit::new(1).unwrap());
        assert!(user.can_borrow_more());
        user.borrowed.insert(BookId::new("B001").unwrap());
        assert!(!user.can_borrow_more());
    }

    #[test]
    fn test_user_display() {
        assert_eq!(user(30).to_string(), "Alice (ID: U001, age 30) - borrowed 0/5");
    }

    #[test]
    fn test_user_deserialize_keeps_borrowed_books() {
        let user: User = serde_json::from_str(
            r#"{"id":"U001","name":"Alice","age":30,"max_borrowed":2,"borrowed":["B001"]}"#,
        )
        .unwrap();
        assert_eq!(user.max_borrowed.value(), 2);
        assert!(user.has_borrowed(&BookId::new("B001").unwrap()));
    }

    #[test]
    fn test_user_deserialize_rejects_empty_name() {
        let result: Result<User, _> = serde_json::from_str(r#"{"id":"U001","name":"","age":30}"#);
        assert!(result.is_err());
    }
}
