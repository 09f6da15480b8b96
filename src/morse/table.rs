use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Один элемент кода Морзе, полученный из одного нажатия клавиши
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Dot,
    Dash,
}

impl Symbol {
    pub fn as_char(&self) -> char {
        match self {
            Symbol::Dot => '.',
            Symbol::Dash => '-',
        }
    }
}

// Статическая таблица: строка кода → символ (26 букв + 10 цифр)
static MORSE_TABLE: Lazy<HashMap<&'static str, char>> = Lazy::new(|| {
    let mut map = HashMap::new();

    // Буквы
    map.insert(".-", 'a');
    map.insert("-...", 'b');
    map.insert("-.-.", 'c');
    map.insert("-..", 'd');
    map.insert(".", 'e');
    map.insert("..-.", 'f');
    map.insert("--.", 'g');
    map.insert("....", 'h');
    map.insert("..", 'i');
    map.insert(".---", 'j');
    map.insert("-.-", 'k');
    map.insert(".-..", 'l');
    map.insert("--", 'm');
    map.insert("-.", 'n');
    map.insert("---", 'o');
    map.insert(".--.", 'p');
    map.insert("--.-", 'q');
    map.insert(".-.", 'r');
    map.insert("...", 's');
    map.insert("-", 't');
    map.insert("..-", 'u');
    map.insert("...-", 'v');
    map.insert(".--", 'w');
    map.insert("-..-", 'x');
    map.insert("-.--", 'y');
    map.insert("--..", 'z');

    // Цифры
    map.insert("-----", '0');
    map.insert(".----", '1');
    map.insert("..---", '2');
    map.insert("...--", '3');
    map.insert("....-", '4');
    map.insert(".....", '5');
    map.insert("-....", '6');
    map.insert("--...", '7');
    map.insert("---..", '8');
    map.insert("----.", '9');

    map
});

/// Найти символ по строке кода. Отсутствие записи — штатный исход
/// ("неизвестный код"), а не ошибка.
pub fn lookup(code: &str) -> Option<char> {
    MORSE_TABLE.get(code).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_as_char() {
        assert_eq!(Symbol::Dot.as_char(), '.');
        assert_eq!(Symbol::Dash.as_char(), '-');
    }

    #[test]
    fn test_lookup_letters() {
        assert_eq!(lookup("."), Some('e'));
        assert_eq!(lookup(".."), Some('i'));
        assert_eq!(lookup("---"), Some('o'));
        assert_eq!(lookup("--.."), Some('z'));
    }

    #[test]
    fn test_lookup_digits() {
        assert_eq!(lookup("-----"), Some('0'));
        assert_eq!(lookup(".----"), Some('1'));
        assert_eq!(lookup("----."), Some('9'));
    }

    #[test]
    fn test_lookup_unknown_code() {
        assert_eq!(lookup("......"), None);
        assert_eq!(lookup(""), None);
        assert_eq!(lookup(".-.-.-"), None);
    }

    #[test]
    fn test_table_covers_letters_and_digits() {
        let mut chars: Vec<char> = MORSE_TABLE.values().copied().collect();
        chars.sort_unstable();
        chars.dedup();
        assert_eq!(chars.len(), 36);
        assert!(chars.iter().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
