//! Built-in text for the content reminders.
//!
//! Entries are picked by the date's ordinal so a given day always shows the
//! same text, no matter how often the day is regenerated.

use chrono::{Datelike, NaiveDate};

/// A short text with its source reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passage {
    pub text: &'static str,
    pub reference: &'static str,
}

const HADITH: &[Passage] = &[
    Passage {
        text: "Actions are judged by intentions, and every person will have what they intended.",
        reference: "Sahih al-Bukhari 1",
    },
    Passage {
        text: "None of you truly believes until he loves for his brother what he loves for himself.",
        reference: "Sahih al-Bukhari 13",
    },
    Passage {
        text: "The most beloved deeds to Allah are those done consistently, even if they are small.",
        reference: "Sahih al-Bukhari 6464",
    },
    Passage {
        text: "Whoever believes in Allah and the Last Day, let him speak good or remain silent.",
        reference: "Sahih al-Bukhari 6018",
    },
    Passage {
        text: "The strong person is not the one who overcomes others, but the one who controls himself when angry.",
        reference: "Sahih al-Bukhari 6114",
    },
];

const VERSES: &[Passage] = &[
    Passage {
        text: "Indeed, with hardship comes ease.",
        reference: "Quran 94:6",
    },
    Passage {
        text: "So remember Me; I will remember you.",
        reference: "Quran 2:152",
    },
    Passage {
        text: "Allah does not burden a soul beyond that it can bear.",
        reference: "Quran 2:286",
    },
    Passage {
        text: "Verily, in the remembrance of Allah do hearts find rest.",
        reference: "Quran 13:28",
    },
];

const FRIDAY: &[Passage] = &[Passage {
    text: "Whoever recites Surah al-Kahf on Friday, light will shine for him between the two Fridays.",
    reference: "Al-Hakim, Mustadrak 3392",
}];

const DHIKR: &[Passage] = &[
    Passage {
        text: "SubhanAllah wa bihamdihi (Glory be to Allah and praise Him), one hundred times.",
        reference: "Sahih Muslim 2691",
    },
    Passage {
        text: "La ilaha illallah wahdahu la sharika lah.",
        reference: "Sahih al-Bukhari 3293",
    },
    Passage {
        text: "Astaghfirullah wa atubu ilayh (I seek Allah's forgiveness and repent to Him).",
        reference: "Sahih al-Bukhari 6307",
    },
];

fn pick(pool: &'static [Passage], date: NaiveDate) -> Passage {
    // Pools are non-empty constants; `ordinal0` keeps the index in range.
    pool[date.ordinal0() as usize % pool.len()]
}

pub fn hadith_of_the_day(date: NaiveDate) -> Passage {
    pick(HADITH, date)
}

pub fn verse_of_the_day(date: NaiveDate) -> Passage {
    pick(VERSES, date)
}

pub fn friday_reading(date: NaiveDate) -> Passage {
    pick(FRIDAY, date)
}

pub fn dhikr_of_the_day(date: NaiveDate) -> Passage {
    pick(DHIKR, date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_date_same_passage_and_days_rotate() {
        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let jan2 = jan1.succ_opt().unwrap();
        assert_eq!(hadith_of_the_day(jan1), hadith_of_the_day(jan1));
        assert_ne!(hadith_of_the_day(jan1), hadith_of_the_day(jan2));
        assert_ne!(verse_of_the_day(jan1), verse_of_the_day(jan2));
    }
}
