//! 状態遷移関数群
//!
//! 可変版（`LendingEngine`）と不変版（`LibrarySnapshot`）の両方がこれを使う。
//! どの関数も検証をすべて終えてから変更を適用するため、
//! エラー時にカタログ・会員管理のどちらも変更されない。

use chrono::Utc;

use crate::config::LendingPolicy;
use crate::domain::{
    Book, BookAdded, BookBorrowed, BookId, BookRestocked, BookReturned, Catalog, LendingError,
    Membership, User, UserId, UserRegistered,
};

pub(super) fn add_book(
    catalog: &mut Catalog,
    book: Book,
    quantity: u32,
) -> Result<BookAdded, LendingError> {
    catalog.add_book(book.clone(), quantity)?;

    Ok(BookAdded {
        book,
        quantity,
        added_at: Utc::now(),
    })
}

pub(super) fn register_user(
    membership: &mut Membership,
    user: User,
) -> Result<UserRegistered, LendingError> {
    membership.register(user.clone())?;

    Ok(UserRegistered {
        user,
        registered_at: Utc::now(),
    })
}

pub(super) fn restock(
    catalog: &mut Catalog,
    book_id: &BookId,
    quantity: u32,
) -> Result<BookRestocked, LendingError> {
    let stock_after = catalog.restock(book_id, quantity)?;

    Ok(BookRestocked {
        book_id: book_id.clone(),
        quantity,
        stock_after,
        restocked_at: Utc::now(),
    })
}

/// 貸出の検証
///
/// 検証順序は固定（最初に失敗した検査のエラーを返す）：
/// 1. 利用者の存在
/// 2. 書籍の存在
/// 3. 出版状態（ポリシーで有効な場合のみ）
/// 4. 在庫
/// 5. 同じ書籍を借りていないこと
/// 6. 最大貸出冊数
/// 7. 年齢制限（制限が0より大きい場合のみ）
pub(super) fn check_borrow(
    catalog: &Catalog,
    membership: &Membership,
    policy: &LendingPolicy,
    user_id: &UserId,
    book_id: &BookId,
) -> Result<(), LendingError> {
    let user = membership.get_user(user_id)?;
    let book = catalog.get_book(book_id)?;

    if policy.enforce_publish_state && !book.publish_state.is_borrowable() {
        return Err(LendingError::NotPublished {
            book_id: book_id.clone(),
            state: book.publish_state,
        });
    }

    if catalog.stock_of(book_id) == 0 {
        return Err(LendingError::OutOfStock(book_id.clone()));
    }

    if user.has_borrowed(book_id) {
        return Err(LendingError::AlreadyBorrowed {
            user_id: user_id.clone(),
            book_id: book_id.clone(),
        });
    }

    if !user.can_borrow_more() {
        return Err(LendingError::BorrowLimitReached {
            user_id: user_id.clone(),
            limit: user.max_borrowed,
        });
    }

    if !user.meets_age_limit(book) {
        return Err(LendingError::AgeRestricted {
            user_id: user_id.clone(),
            book_id: book_id.clone(),
            age: user.age,
            age_limit: book.age_limit,
        });
    }

    Ok(())
}

/// 書籍を貸し出す（在庫-1と貸出中集合への追加を一体で行う）
pub(super) fn borrow_book(
    catalog: &mut Catalog,
    membership: &mut Membership,
    policy: &LendingPolicy,
    user_id: &UserId,
    book_id: &BookId,
) -> Result<BookBorrowed, LendingError> {
    check_borrow(catalog, membership, policy, user_id, book_id)?;

    let stock_after = catalog.adjust_stock(book_id, -1)?;
    if let Err(err) = membership.record_borrow(user_id, book_id) {
        // 在庫の減算を取り消してから失敗を返す
        catalog.adjust_stock(book_id, 1)?;
        return Err(err.into());
    }

    Ok(BookBorrowed {
        user_id: user_id.clone(),
        book_id: book_id.clone(),
        stock_after,
        borrowed_at: Utc::now(),
    })
}

/// 返却の検証（利用者の存在 → 貸出中集合に含まれること）
pub(super) fn check_return(
    membership: &Membership,
    user_id: &UserId,
    book_id: &BookId,
) -> Result<(), LendingError> {
    let user = membership.get_user(user_id)?;

    if !user.has_borrowed(book_id) {
        return Err(LendingError::NotBorrowed {
            user_id: user_id.clone(),
            book_id: book_id.clone(),
        });
    }

    Ok(())
}

/// 書籍を返却する（貸出中集合からの削除と在庫+1を一体で行う）
pub(super) fn return_book(
    catalog: &mut Catalog,
    membership: &mut Membership,
    user_id: &UserId,
    book_id: &BookId,
) -> Result<BookReturned, LendingError> {
    check_return(membership, user_id, book_id)?;

    let stock_after = catalog.adjust_stock(book_id, 1)?;
    if let Err(err) = membership.record_return(user_id, book_id) {
        catalog.adjust_stock(book_id, -1)?;
        return Err(err.into());
    }

    Ok(BookReturned {
        user_id: user_id.clone(),
        book_id: book_id.clone(),
        stock_after,
        returned_at: Utc::now(),
    })
}

/// 不変条件の検証
///
/// - 各利用者の貸出冊数は上限以下
/// - 貸出中の書籍IDはすべてカタログに存在する
/// - 保存則：在庫 + 貸出中の利用者数 == 総追加冊数（書籍ごと）
pub(super) fn check_invariants(
    catalog: &Catalog,
    membership: &Membership,
) -> Result<(), LendingError> {
    for (user_id, user) in membership.entries() {
        if *user_id != user.id {
            return Err(LendingError::InvariantViolation(format!(
                "membership key '{}' does not match user id '{}'",
                user_id, user.id
            )));
        }

        let held = u64::try_from(user.borrowed_count()).unwrap_or(u64::MAX);
        if held > u64::from(user.max_borrowed.value()) {
            return Err(LendingError::InvariantViolation(format!(
                "user '{}' holds {} books over the limit of {}",
                user.id,
                user.borrowed_count(),
                user.max_borrowed
            )));
        }

        if let Some(missing) = user.borrowed_books().find(|id| !catalog.contains(id)) {
            return Err(LendingError::InvariantViolation(format!(
                "user '{}' holds unknown book '{}'",
                user.id, missing
            )));
        }
    }

    for (book_id, entry) in catalog.entries() {
        if *book_id != entry.book.id {
            return Err(LendingError::InvariantViolation(format!(
                "catalog key '{}' does not match book id '{}'",
                book_id, entry.book.id
            )));
        }

        let on_loan = u64::try_from(membership.borrowed_count(book_id)).unwrap_or(u64::MAX);
        if u64::from(entry.stock).saturating_add(on_loan) != u64::from(entry.total_added) {
            return Err(LendingError::InvariantViolation(format!(
                "book '{}' stock {} + on loan {} != total added {}",
                book_id, entry.stock, on_loan, entry.total_added
            )));
        }
    }

    Ok(())
}
