//! 図書館の貸出管理コア
//!
//! 書籍・在庫（カタログ）と利用者・貸出中集合（会員管理）を組み合わせ、
//! 貸出・返却を検証付きの原子的な状態遷移として適用する。
//! 可変版の`LendingEngine`と、純粋関数で新しい状態を返す`LibrarySnapshot`を提供する。

pub mod application;
pub mod config;
pub mod domain;

pub use application::lending::{LendingEngine, LibrarySnapshot};
pub use config::LendingPolicy;
pub use domain::{ErrorKind, LendingError};
