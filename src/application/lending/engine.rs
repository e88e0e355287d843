use serde::Serialize;

use crate::config::LendingPolicy;
use crate::domain::{
    Book, BookAdded, BookBorrowed, BookId, BookRestocked, BookReturned, Catalog, DomainEvent,
    LendingError, Membership, User, UserId, UserRegistered,
};

use super::snapshot::LibrarySnapshot;
use super::transitions;

/// 書籍を借りている利用者（`find_borrower`の結果）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Borrower {
    pub id: UserId,
    pub name: String,
}

impl From<&User> for Borrower {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
        }
    }
}

/// 貸出エンジン（可変版）
///
/// カタログと会員管理を組み合わせ、貸出・返却を原子的な状態遷移として適用する。
/// 成功した操作はドメインイベントとしてジャーナルに追記される。
///
/// 状態は呼び出し側が所有する値であり、プロセス全体で共有されない。
/// 並行に使う場合は、貸出・返却の1回の呼び出し全体を1つのクリティカルセクションとして扱うこと。
#[derive(Debug, Clone, Default)]
pub struct LendingEngine {
    catalog: Catalog,
    membership: Membership,
    policy: LendingPolicy,
    journal: Vec<DomainEvent>,
}

impl LendingEngine {
    pub fn new(policy: LendingPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// スナップショットからエンジンを作成する（ジャーナルは空）
    pub fn from_snapshot(snapshot: LibrarySnapshot) -> Self {
        let (policy, catalog, membership) = snapshot.into_parts();
        Self {
            catalog,
            membership,
            policy,
            journal: Vec::new(),
        }
    }

    /// 書籍を登録する
    ///
    /// # エラー
    /// `DuplicateBook`: 同じIDが既に存在する
    pub fn add_book(&mut self, book: Book, quantity: u32) -> Result<BookAdded, LendingError> {
        let event = transitions::add_book(&mut self.catalog, book, quantity)?;
        tracing::debug!(book_id = %event.book.id, quantity, "book added");
        self.journal.push(DomainEvent::BookAdded(event.clone()));
        Ok(event)
    }

    /// 利用者を登録する
    ///
    /// # エラー
    /// - `DuplicateUser`: 同じIDが既に存在する
    /// - `InvalidInput`: 貸出中の書籍を持った利用者
    pub fn register_user(&mut self, user: User) -> Result<UserRegistered, LendingError> {
        let event = transitions::register_user(&mut self.membership, user)?;
        tracing::debug!(user_id = %event.user.id, "user registered");
        self.journal.push(DomainEvent::UserRegistered(event.clone()));
        Ok(event)
    }

    /// 既存の書籍を入荷する
    ///
    /// # エラー
    /// `BookNotFound`: 未登録の書籍
    pub fn restock(
        &mut self,
        book_id: &BookId,
        quantity: u32,
    ) -> Result<BookRestocked, LendingError> {
        let event = transitions::restock(&mut self.catalog, book_id, quantity)?;
        tracing::debug!(book_id = %book_id, quantity, stock = event.stock_after, "book restocked");
        self.journal.push(DomainEvent::BookRestocked(event.clone()));
        Ok(event)
    }

    /// 書籍を貸し出す
    ///
    /// ビジネスルール（この順に検査し、最初の失敗を返す）：
    /// - 利用者が存在すること（`UserNotFound`）
    /// - 書籍が存在すること（`BookNotFound`）
    /// - 出版済みであること（ポリシーで有効な場合、`NotPublished`）
    /// - 在庫があること（`OutOfStock`）
    /// - 同じ書籍を借りていないこと（`AlreadyBorrowed`）
    /// - 最大貸出冊数に達していないこと（`BorrowLimitReached`）
    /// - 年齢制限を満たすこと（`AgeRestricted`）
    ///
    /// 成功時は在庫-1と貸出中集合への追加が両方行われる。失敗時はどちらも行われない。
    pub fn borrow_book(
        &mut self,
        user_id: &UserId,
        book_id: &BookId,
    ) -> Result<BookBorrowed, LendingError> {
        let event = transitions::borrow_book(
            &mut self.catalog,
            &mut self.membership,
            &self.policy,
            user_id,
            book_id,
        )?;
        tracing::debug!(
            user_id = %user_id,
            book_id = %book_id,
            stock = event.stock_after,
            "book borrowed"
        );
        self.journal.push(DomainEvent::BookBorrowed(event.clone()));
        Ok(event)
    }

    /// 書籍を返却する
    ///
    /// ビジネスルール：
    /// - 利用者が存在すること（`UserNotFound`）
    /// - その書籍を借りていること（`NotBorrowed`）
    ///
    /// 成功時は貸出中集合からの削除と在庫+1が両方行われる。
    pub fn return_book(
        &mut self,
        user_id: &UserId,
        book_id: &BookId,
    ) -> Result<BookReturned, LendingError> {
        let event =
            transitions::return_book(&mut self.catalog, &mut self.membership, user_id, book_id)?;
        tracing::debug!(
            user_id = %user_id,
            book_id = %book_id,
            stock = event.stock_after,
            "book returned"
        );
        self.journal.push(DomainEvent::BookReturned(event.clone()));
        Ok(event)
    }

    /// 書籍を借りている利用者を1人返す
    ///
    /// 利用者IDの昇順に走査し、最初に見つかった利用者を返す。
    /// 在庫は冊数でのみ管理しており個々の複本を区別しないため、
    /// 同じ書籍を複数人が借りている場合は「そのうちの1人」（IDが最小の利用者）になる。
    pub fn find_borrower(&self, book_id: &BookId) -> Option<Borrower> {
        self.membership.borrowers_of(book_id).next().map(Borrower::from)
    }

    /// 書籍を借りている全利用者（ID昇順）
    pub fn find_borrowers(&self, book_id: &BookId) -> Vec<Borrower> {
        self.membership
            .borrowers_of(book_id)
            .map(Borrower::from)
            .collect()
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

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    pub fn policy(&self) -> &LendingPolicy {
        &self.policy
    }

    /// 成功した操作のイベント列（発生順）
    pub fn events(&self) -> &[DomainEvent] {
        &self.journal
    }

    /// 現在の状態の不変スナップショット
    pub fn snapshot(&self) -> LibrarySnapshot {
        LibrarySnapshot::from_parts(self.policy, self.catalog.clone(), self.membership.clone())
    }

    /// 不変条件を検証する
    ///
    /// # エラー
    /// 最初に見つかった違反を`InvariantViolation`として返す
    pub fn check_invariants(&self) -> Result<(), LendingError> {
        transitions::check_invariants(&self.catalog, &self.membership)
    }

    /// イベント列からエンジンを復元する
    ///
    /// 各イベントを現在の状態に順に適用する（foldパターン）。
    /// 適用できないイベントは、その操作を直接呼んだ場合と同じエラーになる。
    /// 復元後のジャーナルは入力イベント列と同じになる。
    pub fn replay(policy: LendingPolicy, events: &[DomainEvent]) -> Result<Self, LendingError> {
        events.iter().try_fold(Self::new(policy), |mut engine, event| {
            engine.apply_event(event)?;
            Ok(engine)
        })
    }

    fn apply_event(&mut self, event: &DomainEvent) -> Result<(), LendingError> {
        let stock_after = match event {
            DomainEvent::BookAdded(e) => {
                transitions::add_book(&mut self.catalog, e.book.clone(), e.quantity)?;
                None
            }
            DomainEvent::UserRegistered(e) => {
                transitions::register_user(&mut self.membership, e.user.clone())?;
                None
            }
            DomainEvent::BookRestocked(e) => {
                let applied = transitions::restock(&mut self.catalog, &e.book_id, e.quantity)?;
                Some((&e.book_id, e.stock_after, applied.stock_after))
            }
            DomainEvent::BookBorrowed(e) => {
                let applied = transitions::borrow_book(
                    &mut self.catalog,
                    &mut self.membership,
                    &self.policy,
                    &e.user_id,
                    &e.book_id,
                )?;
                Some((&e.book_id, e.stock_after, applied.stock_after))
            }
            DomainEvent::BookReturned(e) => {
                let applied = transitions::return_book(
                    &mut self.catalog,
                    &mut self.membership,
                    &e.user_id,
                    &e.book_id,
                )?;
                Some((&e.book_id, e.stock_after, applied.stock_after))
            }
        };

        if let Some((book_id, recorded, replayed)) = stock_after
            && recorded != replayed
        {
            return Err(LendingError::InvariantViolation(format!(
                "replayed stock of book '{book_id}' is {replayed}, event recorded {recorded}"
            )));
        }

        self.journal.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Age, BorrowLimit, ErrorKind, PublishState};

    fn user_id(value: &str) -> UserId {
        UserId::new(value).unwrap()
    }

    fn book_id(value: &str) -> BookId {
        BookId::new(value).unwrap()
    }

    fn book(id: &str) -> Book {
        Book::new(book_id(id), format!("Title {id}"), "Author").unwrap()
    }

    fn user(id: &str, age: u32) -> User {
        User::new(user_id(id), format!("Name {id}"), Age::from(age)).unwrap()
    }

    /// 書籍B1（在庫2）、利用者U1・U2を登録済みのエンジン
    fn setup_engine() -> LendingEngine {
        let mut engine = LendingEngine::new(LendingPolicy::default());
        engine.add_book(book("B1"), 2).unwrap();
        engine.register_user(user("U1", 30)).unwrap();
        engine.register_user(user("U2", 30)).unwrap();
        engine
    }

    // TDD: borrow_book() のテスト
    #[test]
    fn test_borrow_book_success() {
        let mut engine = setup_engine();

        let event = engine.borrow_book(&user_id("U1"), &book_id("B1")).unwrap();

        assert_eq!(event.user_id, user_id("U1"));
        assert_eq!(event.book_id, book_id("B1"));
        assert_eq!(event.stock_after, 1);
        assert_eq!(engine.stock_of(&book_id("B1")), 1);
        assert!(engine.get_user(&user_id("U1")).unwrap().has_borrowed(&book_id("B1")));
        assert!(matches!(engine.events().last(), Some(DomainEvent::BookBorrowed(_))));
    }

    #[test]
    fn test_borrow_book_user_checked_before_book() {
        let mut engine = setup_engine();

        // 利用者も書籍も存在しない場合は利用者のエラーが優先される
        let result = engine.borrow_book(&user_id("U404"), &book_id("B404"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::UserNotFound);
    }

    #[test]
    fn test_borrow_book_publish_state_checked_before_stock() {
        let mut engine = setup_engine();
        let withdrawn = book("B2").with_publish_state(PublishState::Withdrawn);
        engine.add_book(withdrawn, 0).unwrap();

        let result = engine.borrow_book(&user_id("U1"), &book_id("B2"));
        assert_eq!(
            result.unwrap_err(),
            LendingError::NotPublished {
                book_id: book_id("B2"),
                state: PublishState::Withdrawn,
            }
        );
    }

    #[test]
    fn test_borrow_book_publish_state_ignored_when_disabled() {
        let policy = LendingPolicy {
            enforce_publish_state: false,
            ..LendingPolicy::default()
        };
        let mut engine = LendingEngine::new(policy);
        engine
            .add_book(book("B1").with_publish_state(PublishState::Unpublished), 1)
            .unwrap();
        engine.register_user(user("U1", 30)).unwrap();

        assert!(engine.borrow_book(&user_id("U1"), &book_id("B1")).is_ok());
    }

    #[test]
    fn test_borrow_book_stock_checked_before_duplicate() {
        let mut engine = LendingEngine::new(LendingPolicy::default());
        engine.add_book(book("B1"), 1).unwrap();
        engine.register_user(user("U1", 30)).unwrap();
        engine.borrow_book(&user_id("U1"), &book_id("B1")).unwrap();

        // 在庫0かつ既に借りている → 在庫切れが優先される
        let result = engine.borrow_book(&user_id("U1"), &book_id("B1"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::OutOfStock);
    }

    #[test]
    fn test_borrow_book_already_borrowed() {
        let mut engine = setup_engine();
        engine.borrow_book(&user_id("U1"), &book_id("B1")).unwrap();

        let result = engine.borrow_book(&user_id("U1"), &book_id("B1"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::AlreadyBorrowed);
        assert_eq!(engine.stock_of(&book_id("B1")), 1);
    }

    #[test]
    fn test_borrow_book_duplicate_checked_before_limit() {
        let mut engine = LendingEngine::new(LendingPolicy::default());
        engine.add_book(book("B1"), 2).unwrap();
        let reader = user("U1", 30).with_max_borrowed(BorrowLimit::new(1).unwrap());
        engine.register_user(reader).unwrap();
        engine.borrow_book(&user_id("U1"), &book_id("B1")).unwrap();

        // 上限到達かつ同じ書籍を借りている → 重複貸出が優先される
        let result = engine.borrow_book(&user_id("U1"), &book_id("B1"));
        assert_eq!(
            result.unwrap_err(),
            LendingError::AlreadyBorrowed {
                user_id: user_id("U1"),
                book_id: book_id("B1"),
            }
        );
        assert_eq!(engine.stock_of(&book_id("B1")), 1);
    }

    #[test]
    fn test_borrow_book_limit_checked_before_age() {
        let mut engine = LendingEngine::new(LendingPolicy::default());
        engine.add_book(book("B1"), 1).unwrap();
        engine.add_book(book("B2").with_age_limit(Age::from(18)), 1).unwrap();
        let child = user("U1", 10).with_max_borrowed(BorrowLimit::new(1).unwrap());
        engine.register_user(child).unwrap();
        engine.borrow_book(&user_id("U1"), &book_id("B1")).unwrap();

        let result = engine.borrow_book(&user_id("U1"), &book_id("B2"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::BorrowLimitReached);
    }

    #[test]
    fn test_failed_borrow_is_not_journaled() {
        let mut engine = setup_engine();
        let before = engine.events().len();

        let _ = engine.borrow_book(&user_id("U1"), &book_id("B404"));

        assert_eq!(engine.events().len(), before);
    }

    // TDD: return_book() のテスト
    #[test]
    fn test_return_book_success() {
        let mut engine = setup_engine();
        engine.borrow_book(&user_id("U1"), &book_id("B1")).unwrap();

        let event = engine.return_book(&user_id("U1"), &book_id("B1")).unwrap();

        assert_eq!(event.stock_after, 2);
        assert_eq!(engine.get_user(&user_id("U1")).unwrap().borrowed_count(), 0);
    }

    #[test]
    fn test_return_book_unknown_user() {
        let mut engine = setup_engine();
        let result = engine.return_book(&user_id("U404"), &book_id("B1"));
        assert_eq!(result.unwrap_err(), LendingError::UserNotFound(user_id("U404")));
    }

    #[test]
    fn test_return_book_not_borrowed_even_if_book_unknown() {
        let mut engine = setup_engine();
        let result = engine.return_book(&user_id("U1"), &book_id("B404"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotBorrowed);
    }

    // TDD: find_borrower() のテスト
    #[test]
    fn test_find_borrower_none_when_not_borrowed() {
        let engine = setup_engine();
        assert_eq!(engine.find_borrower(&book_id("B1")), None);
    }

    #[test]
    fn test_find_borrower_returns_lowest_user_id() {
        let mut engine = setup_engine();
        engine.borrow_book(&user_id("U2"), &book_id("B1")).unwrap();
        engine.borrow_book(&user_id("U1"), &book_id("B1")).unwrap();

        let borrower = engine.find_borrower(&book_id("B1")).unwrap();
        assert_eq!(borrower.id, user_id("U1"));
        assert_eq!(borrower.name, "Name U1");
        assert_eq!(engine.find_borrowers(&book_id("B1")).len(), 2);
    }

    // TDD: replay() のテスト
    #[test]
    fn test_replay_rebuilds_same_state() {
        let mut engine = setup_engine();
        engine.borrow_book(&user_id("U1"), &book_id("B1")).unwrap();
        engine.borrow_book(&user_id("U2"), &book_id("B1")).unwrap();
        engine.return_book(&user_id("U1"), &book_id("B1")).unwrap();
        engine.restock(&book_id("B1"), 3).unwrap();

        let replayed = LendingEngine::replay(*engine.policy(), engine.events()).unwrap();

        assert_eq!(replayed.snapshot(), engine.snapshot());
        assert_eq!(replayed.events(), engine.events());
    }

    #[test]
    fn test_replay_rejects_inapplicable_event() {
        let mut engine = setup_engine();
        engine.borrow_book(&user_id("U1"), &book_id("B1")).unwrap();
        let mut events = engine.events().to_vec();
        // 同じ貸出イベントを二重に適用しようとする
        if let Some(last) = events.last().cloned() {
            events.push(last);
        }

        let result = LendingEngine::replay(LendingPolicy::default(), &events);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::AlreadyBorrowed);
    }

    #[test]
    fn test_check_invariants_holds_after_operations() {
        let mut engine = setup_engine();
        engine.borrow_book(&user_id("U1"), &book_id("B1")).unwrap();
        assert!(engine.check_invariants().is_ok());
    }
}
