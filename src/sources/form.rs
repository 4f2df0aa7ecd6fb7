use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

use super::{GlyphSource, LineSource, SourceCommon, random_chars};
use crate::config::GeneratorKind;

const UPPER: [char; 26] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S',
    'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];
const DIGITS: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];

const FIRST_NAMES: &[&str] = &[
    "John", "Jane", "Michael", "Sarah", "David", "Lisa", "Robert", "Mary", "James", "Patricia",
    "William", "Jennifer", "Richard", "Elizabeth", "Joseph", "Linda", "Thomas", "Barbara",
    "Christopher", "Susan",
];
const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin",
];
const STREETS: &[&str] = &[
    "Main St", "Oak Ave", "First St", "Second St", "Park Ave", "Elm St", "Washington St",
    "Maple Ave", "Cedar St", "Pine St", "Lake Ave", "Hill St", "Church St", "School St",
    "High St", "Mill St",
];
const MAIL_USERS: &[&str] = &["john", "jane", "mike", "sarah", "alex", "chris", "kelly", "jordan"];
const MAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "company.com",
];

/// The kinds of field a paper form asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Address,
    LicensePlate,
    Phone,
    Email,
    IdNumber,
}

impl FormField {
    pub const ALL: [FormField; 6] = [
        Self::Name,
        Self::Address,
        Self::LicensePlate,
        Self::Phone,
        Self::Email,
        Self::IdNumber,
    ];

    pub fn fill(self, rng: &mut StdRng) -> String {
        match self {
            Self::Name => format!(
                "{} {}",
                FIRST_NAMES.choose(rng).copied().unwrap_or_default(),
                LAST_NAMES.choose(rng).copied().unwrap_or_default()
            ),
            Self::Address => format!(
                "{} {}",
                rng.random_range(1..=9999),
                STREETS.choose(rng).copied().unwrap_or_default()
            ),
            Self::LicensePlate => match rng.random_range(0..3) {
                0 => random_chars(rng, &UPPER, 3) + &random_chars(rng, &DIGITS, 3),
                1 => random_chars(rng, &DIGITS, 3) + &random_chars(rng, &UPPER, 3),
                _ => random_chars(rng, &UPPER, 2) + &random_chars(rng, &DIGITS, 4),
            },
            Self::Phone => {
                let area = rng.random_range(200..=999);
                let exchange = rng.random_range(200..=999);
                let line = rng.random_range(1000..=9999);
                match rng.random_range(0..3) {
                    0 => format!("({}) {}-{}", area, exchange, line),
                    1 => format!("{}-{}-{}", area, exchange, line),
                    _ => format!("{}.{}.{}", area, exchange, line),
                }
            }
            Self::Email => {
                let mut user = MAIL_USERS.choose(rng).copied().unwrap_or("user").to_string();
                if rng.random_bool(0.3) {
                    user.push_str(&rng.random_range(1..=999).to_string());
                }
                format!("{}@{}", user, MAIL_DOMAINS.choose(rng).copied().unwrap_or_default())
            }
            Self::IdNumber => {
                let length = rng.random_range(6..=12);
                random_chars(rng, &DIGITS, length)
            }
        }
    }
}

/// Short form-field values: names, street addresses, plates, phone numbers,
/// e-mail addresses and ID numbers.
pub struct FormSource {
    common: SourceCommon,
}

impl FormSource {
    pub(crate) fn new(common: SourceCommon) -> Self {
        Self { common }
    }
}

impl LineSource for FormSource {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Form
    }

    fn language(&self) -> &str {
        &self.common.language
    }

    fn produce_text(&self, index: u64, rng: &mut StdRng) -> Option<String> {
        // field values carry their own length
        self.common.text_or(index, rng, |rng, _| {
            let field = FormField::ALL.choose(rng).copied().unwrap_or(FormField::Name);
            field.fill(rng)
        })
    }

    fn resolve_glyph_source(&self, rng: &mut StdRng) -> GlyphSource<'_> {
        self.common.backend.select(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::tests::{asset_backend, common};
    use rand::SeedableRng;

    fn is_digits(value: &str) -> bool {
        value.chars().all(|ch| ch.is_ascii_digit())
    }

    #[test]
    fn phone_numbers_follow_one_of_three_layouts() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..30 {
            let phone = FormField::Phone.fill(&mut rng);
            let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
            assert_eq!(digits.len(), 10, "{}", phone);
            let layout_ok = (phone.starts_with('(') && phone.contains(") ") && phone.contains('-'))
                || phone.split('-').count() == 3
                || phone.split('.').count() == 3;
            assert!(layout_ok, "{}", phone);
        }
    }

    #[test]
    fn plates_ids_and_emails_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..30 {
            let plate = FormField::LicensePlate.fill(&mut rng);
            assert_eq!(plate.len(), 6, "{}", plate);
            assert!(plate.chars().all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit()));

            let id = FormField::IdNumber.fill(&mut rng);
            assert!((6..=12).contains(&id.len()) && is_digits(&id), "{}", id);

            let email = FormField::Email.fill(&mut rng);
            let (user, domain) = email.split_once('@').expect("at sign");
            assert!(MAIL_DOMAINS.contains(&domain));
            let name = user.trim_end_matches(|ch: char| ch.is_ascii_digit());
            assert!(MAIL_USERS.contains(&name), "{}", email);
        }
    }

    #[test]
    fn names_and_addresses_use_two_parts() {
        let mut rng = StdRng::seed_from_u64(2);
        let name = FormField::Name.fill(&mut rng);
        let (first, last) = name.split_once(' ').expect("space");
        assert!(FIRST_NAMES.contains(&first) && LAST_NAMES.contains(&last));
        let address = FormField::Address.fill(&mut rng);
        let (number, street) = address.split_once(' ').expect("space");
        assert!(is_digits(number) && STREETS.contains(&street));
    }

    #[test]
    fn source_ignores_length_bounds() {
        let source = FormSource::new(common(asset_backend("abc"), 1, 2));
        let mut rng = StdRng::seed_from_u64(7);
        let lines: Vec<String> = (0..20)
            .map(|index| source.produce_text(index, &mut rng).expect("text"))
            .collect();
        assert!(lines.iter().any(|line| line.chars().count() > 2));
        assert_eq!(source.kind(), GeneratorKind::Form);
    }
}
