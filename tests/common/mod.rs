#![allow(dead_code)]

use library_lending::domain::{Age, Book, BookId, User, UserId};

pub fn user_id(value: &str) -> UserId {
    UserId::new(value).expect("valid user id")
}

pub fn book_id(value: &str) -> BookId {
    BookId::new(value).expect("valid book id")
}

/// 出版済み・年齢制限なしのテスト用書籍
pub fn book(id: &str) -> Book {
    Book::new(book_id(id), format!("Title {id}"), "Author").expect("valid book")
}

/// デフォルト上限のテスト用利用者
pub fn user(id: &str, age: u32) -> User {
    User::new(user_id(id), format!("User {id}"), Age::from(age)).expect("valid user")
}
