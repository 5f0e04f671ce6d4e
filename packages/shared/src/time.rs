//! Timestamp helpers.
//!
//! All wire timestamps are Unix milliseconds in UTC. Conversion to a
//! human-readable form happens at the presentation edge only.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current Unix timestamp in milliseconds (UTC).
pub fn now_unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render a Unix millisecond timestamp as an RFC 3339 string.
///
/// Out-of-range values fall back to the Unix epoch rather than panicking.
pub fn unix_millis_to_rfc3339(millis: i64) -> String {
    let datetime = DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp_millis(0).unwrap());
    datetime.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_unix_millis_is_recent() {
        // テスト項目: 現在時刻が 2024 年以降のミリ秒タイムスタンプとして返される
        // when (操作):
        let now = now_unix_millis();

        // then (期待する結果):
        assert!(now > 1_700_000_000_000); // 2023-11-14 以降
    }

    #[test]
    fn test_unix_millis_to_rfc3339() {
        // テスト項目: ミリ秒タイムスタンプを RFC 3339 文字列に変換できる
        // given (前提条件):
        let millis = 1_672_498_800_000i64;

        // when (操作):
        let rendered = unix_millis_to_rfc3339(millis);

        // then (期待する結果):
        assert_eq!(rendered, "2022-12-31T15:00:00.000Z");
    }

    #[test]
    fn test_unix_millis_to_rfc3339_out_of_range() {
        // テスト項目: 範囲外の値はエポックにフォールバックする
        // when (操作):
        let rendered = unix_millis_to_rfc3339(i64::MAX);

        // then (期待する結果):
        assert_eq!(rendered, "1970-01-01T00:00:00.000Z");
    }
}
