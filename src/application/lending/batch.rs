use serde::{Deserialize, Serialize};

use crate::domain::{BookId, DomainEvent, LendingError, UserId};

use super::engine::LendingEngine;

/// バッチで実行する貸出・返却操作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Borrow { user_id: UserId, book_id: BookId },
    Return { user_id: UserId, book_id: BookId },
}

/// 失敗した操作の扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchMode {
    /// 失敗を記録して次の操作に進む
    #[default]
    ContinueOnError,
    /// 最初の失敗で中断する
    StopOnFirstError,
}

/// 失敗した操作（入力列での位置とエラー）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub index: usize,
    pub operation: Operation,
    pub error: LendingError,
}

/// バッチの実行結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// 成功した操作のイベント（実行順）
    pub applied: Vec<DomainEvent>,
    pub failures: Vec<BatchFailure>,
    /// `StopOnFirstError`で途中終了したか
    pub stopped_early: bool,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 操作列を順に実行する
///
/// 失敗した操作は状態を変更しない（各操作が原子的なため）。
/// 失敗時に続行するか中断するかは`mode`で呼び出し側が決める。
///
/// # 戻り値
/// 成功したイベントと失敗の一覧
pub fn run_batch<I>(engine: &mut LendingEngine, operations: I, mode: BatchMode) -> BatchReport
where
    I: IntoIterator<Item = Operation>,
{
    let mut report = BatchReport::default();

    for (index, operation) in operations.into_iter().enumerate() {
        let result = match &operation {
            Operation::Borrow { user_id, book_id } => engine
                .borrow_book(user_id, book_id)
                .map(DomainEvent::BookBorrowed),
            Operation::Return { user_id, book_id } => engine
                .return_book(user_id, book_id)
                .map(DomainEvent::BookReturned),
        };

        match result {
            Ok(event) => report.applied.push(event),
            Err(error) => {
                tracing::warn!(index, kind = %error.kind(), %error, "operation rejected");
                report.failures.push(BatchFailure {
                    index,
                    operation,
                    error,
                });
                if mode == BatchMode::StopOnFirstError {
                    report.stopped_early = true;
                    break;
                }
            }
        }
    }

    tracing::info!(
        applied = report.applied.len(),
        failed = report.failures.len(),
        stopped_early = report.stopped_early,
        "batch finished"
    );

    report
}
