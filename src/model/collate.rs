//! Ordering for exercise names - сортировка по-русски
//!
//! Cyrillic letters are contiguous in Unicode except `ё`, which sits after
//! `я`. Names are compared case-insensitively with `ё` folded onto `е`, then
//! ties are broken so the order stays total.

use std::cmp::Ordering;

fn fold(c: char) -> char {
    match c {
        'ё' => 'е',
        other => other,
    }
}

/// Compare two names the way a Russian-locale listing orders them
pub fn compare(a: &str, b: &str) -> Ordering {
    let la = a.to_lowercase();
    let lb = b.to_lowercase();
    la.chars()
        .map(fold)
        .cmp(lb.chars().map(fold))
        .then_with(|| la.cmp(&lb))
        .then_with(|| a.cmp(b))
}

pub fn sort_names(names: &mut [String]) {
    names.sort_by(|a, b| compare(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yo_sorts_with_ye() {
        let mut names = vec![
            "ёлочка".to_string(),
            "жим".to_string(),
            "есть".to_string(),
            "яблоко".to_string(),
        ];
        sort_names(&mut names);
        // ё сортируется как е, а не после я
        assert_eq!(names, vec!["ёлочка", "есть", "жим", "яблоко"]);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(compare("Приседания", "отжимания"), Ordering::Greater);
        assert_eq!(compare("австралийские", "Берпи"), Ordering::Less);
    }

    #[test]
    fn test_latin_before_cyrillic() {
        assert_eq!(compare("Burpee", "берпи"), Ordering::Less);
    }
}
