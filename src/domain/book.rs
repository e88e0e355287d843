use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Age, BookId, PublishState, ValidationError};

/// 書籍 - カタログに一度だけ登録され、以後は不変
///
/// 在庫数は書籍そのものではなくカタログ側で管理する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BookRecord")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    /// 借りられる最低年齢（0は制限なし）
    pub age_limit: Age,
    pub publish_state: PublishState,
}

/// デシリアライズ用の生データ（`Book::new`の検証を通してから`Book`にする）
#[derive(Deserialize)]
struct BookRecord {
    id: BookId,
    title: String,
    author: String,
    #[serde(default)]
    age_limit: Age,
    #[serde(default)]
    publish_state: PublishState,
}

impl TryFrom<BookRecord> for Book {
    type Error = ValidationError;

    fn try_from(record: BookRecord) -> Result<Self, Self::Error> {
        Ok(Book::new(record.id, record.title, record.author)?
            .with_age_limit(record.age_limit)
            .with_publish_state(record.publish_state))
    }
}

impl Book {
    /// 出版済み・年齢制限なしの書籍を作成する
    ///
    /// # エラー
    /// タイトルまたは著者が空の場合は`ValidationError::EmptyField`を返す
    pub fn new(
        id: BookId,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let title = title.into();
        let author = author.into();
        if title.trim().is_empty() {
            return Err(ValidationError::EmptyField("title"));
        }
        if author.trim().is_empty() {
            return Err(ValidationError::EmptyField("author"));
        }

        Ok(Self {
            id,
            title,
            author,
            age_limit: Age::UNRESTRICTED,
            publish_state: PublishState::Published,
        })
    }

    pub fn with_age_limit(self, age_limit: Age) -> Self {
        Self { age_limit, ..self }
    }

    pub fn with_publish_state(self, publish_state: PublishState) -> Self {
        Self {
            publish_state,
            ..self
        }
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} - {}", self.id, self.title, self.author)?;
        if !self.age_limit.is_unrestricted() {
            write!(f, " ({}+)", self.age_limit)?;
        }
        if !self.publish_state.is_borrowable() {
            write!(f, " <{}>", self.publish_state)?;
        }
        Ok(())
    }
}
