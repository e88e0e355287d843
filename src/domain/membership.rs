use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{BookId, MembershipError, User, UserId, ValidationError};

/// 会員管理 - 利用者と各利用者の貸出中集合を排他的に所有する
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Membership {
    users: BTreeMap<UserId, User>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    /// 利用者を登録する
    ///
    /// # エラー
    /// - `DuplicateUser`: 同じIDが既に存在する
    /// - `Invalid`: 貸出中の書籍を持ったまま登録しようとした
    pub fn register(&mut self, user: User) -> Result<(), MembershipError> {
        if self.users.contains_key(&user.id) {
            return Err(MembershipError::DuplicateUser(user.id));
        }
        if !user.borrowed.is_empty() {
            return Err(ValidationError::PreexistingLoans(user.id).into());
        }

        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    pub fn get_user(&self, id: &UserId) -> Result<&User, MembershipError> {
        self.users
            .get(id)
            .ok_or_else(|| MembershipError::UserNotFound(id.clone()))
    }

    pub fn find_user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    /// 利用者の貸出中集合に書籍を追加する
    ///
    /// # エラー
    /// - `UserNotFound`: 未登録の利用者
    /// - `AlreadyBorrowed`: 既に同じ書籍を借りている
    /// - `BorrowLimitReached`: 最大貸出冊数に達している
    pub fn record_borrow(
        &mut self,
        user_id: &UserId,
        book_id: &BookId,
    ) -> Result<(), MembershipError> {
        let user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| MembershipError::UserNotFound(user_id.clone()))?;

        if user.has_borrowed(book_id) {
            return Err(MembershipError::AlreadyBorrowed {
                user_id: user_id.clone(),
                book_id: book_id.clone(),
            });
        }
        if !user.can_borrow_more() {
            return Err(MembershipError::BorrowLimitReached {
                user_id: user_id.clone(),
                limit: user.max_borrowed,
            });
        }

        user.borrowed.insert(book_id.clone());
        Ok(())
    }

    /// 利用者の貸出中集合から書籍を取り除く
    ///
    /// # エラー
    /// - `UserNotFound`: 未登録の利用者
    /// - `NotBorrowed`: その書籍を借りていない
    pub fn record_return(
        &mut self,
        user_id: &UserId,
        book_id: &BookId,
    ) -> Result<(), MembershipError> {
        let user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| MembershipError::UserNotFound(user_id.clone()))?;

        if !user.borrowed.remove(book_id) {
            return Err(MembershipError::NotBorrowed {
                user_id: user_id.clone(),
                book_id: book_id.clone(),
            });
        }
        Ok(())
    }

    /// 全利用者（ID昇順）
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&UserId, &User)> {
        self.users.iter()
    }

    /// 指定書籍を現在借りている利用者（ID昇順）
    pub fn borrowers_of<'a>(&'a self, book_id: &'a BookId) -> impl Iterator<Item = &'a User> {
        self.users.values().filter(move |user| user.has_borrowed(book_id))
    }

    /// 指定書籍を現在借りている利用者数
    pub fn borrowed_count(&self, book_id: &BookId) -> usize {
        self.borrowers_of(book_id).count()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
