//! Fixed category tables the mock oracle indexes into.

pub const MAKES: &[&str] = &["Honda", "Toyota", "Ford", "BMW", "Tesla", "Nissan", "Chevrolet"];

pub const MODELS: &[&str] = &[
    "Civic",
    "Camry",
    "F150",
    "3 Series",
    "Model 3",
    "Altima",
    "Silverado",
];

pub const YEAR_RANGES: &[&str] = &["2020-2021", "2021-2022", "2022-2023", "2023-2024"];

pub const COLORS: &[&str] = &["Black", "White", "Gray", "Silver", "Red", "Blue", "Green"];

pub const BODY_TYPES: &[&str] = &["sedan", "SUV", "truck", "coupe", "wagon"];

/// Plate layouts: `L` is a letter position, `D` a digit position.
pub const PLATE_TEMPLATES: &[&str] = &["LLLDDDD", "DLLLDDD", "LLDDDDD", "DDDLLL", "LDDLLL"];

/// Pick the entry of `table` selected by `word`.
pub fn pick(table: &'static [&'static str], word: u32) -> &'static str {
    table[word as usize % table.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_only_use_letter_and_digit_slots() {
        for t in PLATE_TEMPLATES {
            assert!(t.chars().all(|c| c == 'L' || c == 'D'), "bad template {t}");
        }
    }

    #[test]
    fn pick_wraps() {
        assert_eq!(pick(MAKES, 0), "Honda");
        assert_eq!(pick(MAKES, 7), "Honda");
        assert_eq!(pick(BODY_TYPES, u32::MAX), BODY_TYPES[u32::MAX as usize % 5]);
    }
}
