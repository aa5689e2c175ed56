//! Quality gate between extraction and persistence/publishing.

use crate::classifier::NOT_A_VACANCY;
use crate::extract::ExtractedRecord;

/// Listings shorter than this are degenerate extractions (usually the
/// model's whole reply was one short non-JSON line), not real postings.
pub const MIN_MESSAGE_CHARS: usize = 50;

/// Whether an extracted record qualifies as a postable job listing.
///
/// Rejects the explicit negative classification and anything below the
/// length floor. Nothing else is validated — the phone may be empty and
/// HTML tags are taken as-is.
pub fn accepts(record: &ExtractedRecord) -> bool {
    let message = record.message.trim();
    if message == NOT_A_VACANCY {
        return false;
    }
    message.chars().count() >= MIN_MESSAGE_CHARS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(message: &str) -> ExtractedRecord {
        ExtractedRecord {
            phone: String::new(),
            message: message.to_string(),
        }
    }

    #[test]
    fn sentinel_is_rejected() {
        assert!(!accepts(&record(NOT_A_VACANCY)));
        assert!(!accepts(&record("  Не вакансия  ")));
    }

    #[test]
    fn short_message_is_rejected() {
        assert!(!accepts(&record("Требуется курьер")));
    }

    #[test]
    fn length_floor_counts_characters_not_bytes() {
        // 49 Cyrillic characters are ~98 bytes; still below the floor.
        let m49: String = "я".repeat(49);
        assert!(!accepts(&record(&m49)));

        let m50: String = "я".repeat(50);
        assert!(accepts(&record(&m50)));
    }

    #[test]
    fn real_listing_is_accepted() {
        let listing =
            "💼 <b>Курьер</b>\nДоставка документов по Минску, график 5/2, з/п от 1000 BYN";
        assert!(accepts(&record(listing)));
        assert!(listing.chars().count() >= MIN_MESSAGE_CHARS);
    }

    #[test]
    fn empty_phone_does_not_affect_acceptance() {
        let listing = "Ищем администратора в салон красоты, график сменный, ставка + процент";
        let rec = ExtractedRecord {
            phone: String::new(),
            message: listing.to_string(),
        };
        assert!(accepts(&rec));
    }
}
