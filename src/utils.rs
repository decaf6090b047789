macro_rules! regex {
    ($pattern: expr) => {{
        use once_cell::sync::OnceCell;
        use regex::Regex;
        static CELL: OnceCell<Regex> = OnceCell::new();
        CELL.get_or_init(|| Regex::new($pattern).unwrap())
    }};
}

/// Current time as Unix epoch seconds.
pub fn timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn env_bool<T: AsRef<str>>(s: T) -> bool {
    let s = s.as_ref().trim();
    !(s.is_empty() || s == "0" || s.to_ascii_lowercase() == "false")
}

#[test]
fn test_env_bool() {
    assert!(env_bool("1"));
    assert!(env_bool("True"));
    assert!(!env_bool(""));
    assert!(!env_bool(" 0 "));
    assert!(!env_bool("FALSE"));
}
