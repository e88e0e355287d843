use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LendingPolicy;
use crate::domain::{
    Book, BookAdded, BookBorrowed, BookId, BookRestocked, BookReturned, Catalog, LendingError,
    Membership, User, UserId, UserRegistered,
};

use super::engine::Borrower;
use super::transitions;

/// スナップショットの読み込みエラー
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// JSONとして解釈できない、またはフィールドが不正
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    /// 解釈はできたが不変条件を満たさない
    #[error("inconsistent snapshot: {0}")]
    Inconsistent(#[source] LendingError),
}

/// 図書館全体の状態を表す不変値
///
/// すべての操作は純粋関数で、新しいスナップショットとイベントを返す。
/// 受け取ったスナップショット自体は変更しない（コピーオンライト）。
/// 検証規則と順序は`LendingEngine`と共通。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    policy: LendingPolicy,
    catalog: Catalog,
    membership: Membership,
}

impl LibrarySnapshot {
    /// 空の状態
    pub fn empty(policy: LendingPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub(super) fn from_parts(
        policy: LendingPolicy,
        catalog: Catalog,
        membership: Membership,
    ) -> Self {
        Self {
            policy,
            catalog,
            membership,
        }
    }

    pub(super) fn into_parts(self) -> (LendingPolicy, Catalog, Membership) {
        (self.policy, self.catalog, self.membership)
    }

    /// 純粋関数：書籍を登録する
    pub fn add_book(&self, book: Book, quantity: u32) -> Result<(Self, BookAdded), LendingError> {
        let mut catalog = self.catalog.clone();
        let event = transitions::add_book(&mut catalog, book, quantity)?;
        Ok((
            Self {
                catalog,
                ..self.clone()
            },
            event,
        ))
    }

    /// 純粋関数：利用者を登録する
    pub fn register_user(&self, user: User) -> Result<(Self, UserRegistered), LendingError> {
        let mut membership = self.membership.clone();
        let event = transitions::register_user(&mut membership, user)?;
        Ok((
            Self {
                membership,
                ..self.clone()
            },
            event,
        ))
    }

    /// 純粋関数：書籍を入荷する
    pub fn restock(
        &self,
        book_id: &BookId,
        quantity: u32,
    ) -> Result<(Self, BookRestocked), LendingError> {
        let mut catalog = self.catalog.clone();
        let event = transitions::restock(&mut catalog, book_id, quantity)?;
        Ok((
            Self {
                catalog,
                ..self.clone()
            },
            event,
        ))
    }

    /// 純粋関数：書籍を貸し出す
    ///
    /// 検証に失敗した場合は何も複製せずにエラーを返す。
    pub fn borrow_book(
        &self,
        user_id: &UserId,
        book_id: &BookId,
    ) -> Result<(Self, BookBorrowed), LendingError> {
        transitions::check_borrow(
            &self.catalog,
            &self.membership,
            &self.policy,
            user_id,
            book_id,
        )?;

        let mut next = self.clone();
        let event = transitions::borrow_book(
            &mut next.catalog,
            &mut next.membership,
            &next.policy,
            user_id,
            book_id,
        )?;
        Ok((next, event))
    }

    /// 純粋関数：書籍を返却する
    pub fn return_book(
        &self,
        user_id: &UserId,
        book_id: &BookId,
    ) -> Result<(Self, BookReturned), LendingError> {
        transitions::check_return(&self.membership, user_id, book_id)?;

        let mut next = self.clone();
        let event =
            transitions::return_book(&mut next.catalog, &mut next.membership, user_id, book_id)?;
        Ok((next, event))
    }

    pub fn get_book(&self, book_id: &BookId) -> Result<&Book, LendingError> {
        Ok(self.catalog.get_book(book_id)?)
    }

    pub fn get_user(&self, user_id: &UserId) -> Result<&User, LendingError> {
        Ok(self.membership.get_user(user_id)?)
    }

    pub fn stock_of(&self, book_id: &BookId) -> u32 {
        self.catalog.stock_of(book_id)
    }

    /// `LendingEngine::find_borrower`と同じ規則（ID最小の利用者）
    pub fn find_borrower(&self, book_id: &BookId) -> Option<Borrower> {
        self.membership.borrowers_of(book_id).next().map(Borrower::from)
    }

    pub fn available_books(&self) -> impl Iterator<Item = &Book> {
        self.catalog.available_books()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    pub fn policy(&self) -> &LendingPolicy {
        &self.policy
    }

    pub fn check_invariants(&self) -> Result<(), LendingError> {
        transitions::check_invariants(&self.catalog, &self.membership)
    }

    /// JSONに変換する
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// JSONから復元する
    ///
    /// フィールドの検証（空のID・タイトル・著者・名前、負の年齢など）に加え、
    /// 不変条件も再検証する。
    ///
    /// # エラー
    /// - `Malformed`: JSONとして不正、またはフィールドが不正
    /// - `Inconsistent`: 不変条件を満たさない
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot
            .check_invariants()
            .map_err(SnapshotError::Inconsistent)?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Age, ErrorKind};

    fn user_id(value: &str) -> UserId {
        UserId::new(value).unwrap()
    }

    fn book_id(value: &str) -> BookId {
        BookId::new(value).unwrap()
    }

    fn setup_snapshot() -> LibrarySnapshot {
        let book = Book::new(book_id("B1"), "Clean Code", "Robert Martin").unwrap();
        let user = User::new(user_id("U1"), "Alice", Age::from(30)).unwrap();

        let (snapshot, _) = LibrarySnapshot::empty(LendingPolicy::default())
            .add_book(book, 1)
            .unwrap();
        let (snapshot, _) = snapshot.register_user(user).unwrap();
        snapshot
    }

    #[test]
    fn test_borrow_book_returns_new_state_and_keeps_original() {
        let original = setup_snapshot();

        let (next, event) = original.borrow_book(&user_id("U1"), &book_id("B1")).unwrap();

        assert_eq!(event.stock_after, 0);
        assert_eq!(next.stock_of(&book_id("B1")), 0);
        // 元の状態は変わらない
        assert_eq!(original.stock_of(&book_id("B1")), 1);
        assert_eq!(original.get_user(&user_id("U1")).unwrap().borrowed_count(), 0);
    }

    #[test]
    fn test_borrow_then_return_restores_state() {
        let original = setup_snapshot();

        let (borrowed, _) = original.borrow_book(&user_id("U1"), &book_id("B1")).unwrap();
        let (returned, _) = borrowed.return_book(&user_id("U1"), &book_id("B1")).unwrap();

        assert_eq!(returned, original);
    }

    #[test]
    fn test_return_book_not_borrowed() {
        let snapshot = setup_snapshot();
        let result = snapshot.return_book(&user_id("U1"), &book_id("B1"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotBorrowed);
    }

    #[test]
    fn test_find_borrower() {
        let (snapshot, _) = setup_snapshot()
            .borrow_book(&user_id("U1"), &book_id("B1"))
            .unwrap();
        let borrower = snapshot.find_borrower(&book_id("B1")).unwrap();
        assert_eq!(borrower.name, "Alice");
    }

    // JSON変換のテスト
    #[test]
    fn test_json_round_trip() {
        let (snapshot, _) = setup_snapshot()
            .borrow_book(&user_id("U1"), &book_id("B1"))
            .unwrap();

        let json = snapshot.to_json().unwrap();
        let restored = LibrarySnapshot::from_json(&json).unwrap();

        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_from_json_rejects_broken_conservation() {
        let (snapshot, _) = setup_snapshot()
            .borrow_book(&user_id("U1"), &book_id("B1"))
            .unwrap();
        let mut value: serde_json::Value =
            serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        // 貸出中なのに在庫を1に戻す
        value["catalog"]["B1"]["stock"] = serde_json::json!(1);

        let result = LibrarySnapshot::from_json(&value.to_string());
        assert!(matches!(result, Err(SnapshotError::Inconsistent(_))));
    }

    #[test]
    fn test_from_json_rejects_negative_stock() {
        let mut value: serde_json::Value =
            serde_json::from_str(&setup_snapshot().to_json().unwrap()).unwrap();
        value["catalog"]["B1"]["stock"] = serde_json::json!(-1);

        let result = LibrarySnapshot::from_json(&value.to_string());
        assert!(matches!(result, Err(SnapshotError::Malformed(_))));
    }

    #[test]
    fn test_from_json_rejects_empty_title() {
        let mut value: serde_json::Value =
            serde_json::from_str(&setup_snapshot().to_json().unwrap()).unwrap();
        value["catalog"]["B1"]["book"]["title"] = serde_json::json!("");

        let result = LibrarySnapshot::from_json(&value.to_string());
        assert!(matches!(result, Err(SnapshotError::Malformed(_))));
    }

    #[test]
    fn test_from_json_rejects_empty_user_name() {
        let mut value: serde_json::Value =
            serde_json::from_str(&setup_snapshot().to_json().unwrap()).unwrap();
        value["membership"]["U1"]["name"] = serde_json::json!("");

        let result = LibrarySnapshot::from_json(&value.to_string());
        assert!(matches!(result, Err(SnapshotError::Malformed(_))));
    }
}
