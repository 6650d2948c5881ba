//! IdGenerator port - ID 生成の抽象化
//!
//! id を持たない文書が insert されたとき、ストアはここから id を採番する。
//! 呼び出し側が id を付けて insert した場合は使われない。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use ulid::Ulid;

use crate::domain::DocumentId;
use crate::ports::Clock;

/// IdGenerator は文書 ID を生成
///
/// # ULID の特性
/// - 時刻でソート可能
/// - 分散環境で生成可能（調整不要）
/// - 128-bit（UUID 互換）
///
/// # Thread Safety
/// - `Send + Sync` を要求（ストアの全 writer で共有される）
pub trait IdGenerator: Send + Sync {
    fn generate_document_id(&self) -> DocumentId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// 時刻部分は Clock から、残りは乱数。
/// [`crate::ports::FixedClock`] を渡せばタイムスタンプが既知の ID になる。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_document_id(&self) -> DocumentId {
        let timestamp_ms = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        DocumentId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
