use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Book, BookId, CatalogError};

/// カタログの1エントリ（書籍と在庫カウンタ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub book: Book,
    /// 貸出可能な冊数
    pub stock: u32,
    /// これまでに追加された総冊数（保存則の基準値）
    pub total_added: u32,
}

/// カタログ - 書籍と書籍ごとの在庫を排他的に所有する
///
/// 不変条件：在庫は負にならない（u32 と `adjust_stock` の検査で保証）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    entries: BTreeMap<BookId, CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 書籍を登録し、初期在庫を設定する（0冊も可）
    ///
    /// # エラー
    /// 同じIDが既に存在する場合は`CatalogError::DuplicateBook`を返す
    pub fn add_book(&mut self, book: Book, initial_quantity: u32) -> Result<(), CatalogError> {
        if self.entries.contains_key(&book.id) {
            return Err(CatalogError::DuplicateBook(book.id));
        }

        self.entries.insert(
            book.id.clone(),
            CatalogEntry {
                book,
                stock: initial_quantity,
                total_added: initial_quantity,
            },
        );
        Ok(())
    }

    pub fn get_book(&self, id: &BookId) -> Result<&Book, CatalogError> {
        self.entries
            .get(id)
            .map(|entry| &entry.book)
            .ok_or_else(|| CatalogError::BookNotFound(id.clone()))
    }

    pub fn find_book(&self, id: &BookId) -> Option<&Book> {
        self.entries.get(id).map(|entry| &entry.book)
    }

    pub fn contains(&self, id: &BookId) -> bool {
        self.entries.contains_key(id)
    }

    /// 現在の在庫数（未登録IDは0、エラーではない）
    pub fn stock_of(&self, id: &BookId) -> u32 {
        self.entries.get(id).map_or(0, |entry| entry.stock)
    }

    /// これまでに追加された総冊数（未登録IDは0）
    pub fn total_added(&self, id: &BookId) -> u32 {
        self.entries.get(id).map_or(0, |entry| entry.total_added)
    }

    /// 在庫を増減する（貸出で-1、返却で+1）
    ///
    /// 失敗時は在庫を変更しない。
    ///
    /// # エラー
    /// - `BookNotFound`: 未登録の書籍
    /// - `NegativeStock`: 調整後の在庫が0未満になる
    /// - `StockOverflow`: 調整後の在庫がカウンタの上限を超える
    pub fn adjust_stock(&mut self, id: &BookId, delta: i64) -> Result<u32, CatalogError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| CatalogError::BookNotFound(id.clone()))?;

        let adjusted = i64::from(entry.stock) + delta;
        if adjusted < 0 {
            return Err(CatalogError::NegativeStock {
                book_id: id.clone(),
                stock: entry.stock,
                delta,
            });
        }
        entry.stock =
            u32::try_from(adjusted).map_err(|_| CatalogError::StockOverflow(id.clone()))?;
        Ok(entry.stock)
    }

    /// 新しい冊数を入荷する（在庫と総冊数の両方を増やす）
    pub fn restock(&mut self, id: &BookId, quantity: u32) -> Result<u32, CatalogError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| CatalogError::BookNotFound(id.clone()))?;

        let (Some(stock), Some(total_added)) = (
            entry.stock.checked_add(quantity),
            entry.total_added.checked_add(quantity),
        ) else {
            return Err(CatalogError::StockOverflow(id.clone()));
        };
        entry.stock = stock;
        entry.total_added = total_added;
        Ok(stock)
    }

    /// 全書籍（ID昇順）
    pub fn books(&self) -> impl Iterator<Item = &Book> {
        self.entries.values().map(|entry| &entry.book)
    }

    /// 在庫のある書籍（ID昇順）
    pub fn available_books(&self) -> impl Iterator<Item = &Book> {
        self.entries
            .values()
            .filter(|entry| entry.stock > 0)
            .map(|entry| &entry.book)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&BookId, &CatalogEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
