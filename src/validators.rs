use crate::error::ValidationFailed;

pub struct Validator<'a, T: ?Sized>(&'a [(&'static str, &'a (dyn Fn(&T) -> bool + Sync))]);

impl<'a, T: ?Sized> Validator<'a, T> {
    pub fn run<U: AsRef<T>>(&self, value: U) -> Result<(), ValidationFailed> {
        let Validator(sub_validators) = *self;
        for (message, validator) in sub_validators {
            if !validator(value.as_ref()) {
                return Err(ValidationFailed(message));
            }
        }
        Ok(())
    }
}

macro_rules! not_blank {
    () => {
        |s: &str| !s.trim().is_empty()
    };
}

macro_rules! max {
    ($n: expr) => {
        |s: &str| s.chars().count() <= $n
    };
}

macro_rules! is_match {
    ($pattern: expr) => {
        |s: &str| regex!($pattern).is_match(s)
    };
}

pub static USERNAME: Validator<str> = Validator(&[
    ("Username is required.", &not_blank!()),
    ("Username length shall not be more than 64.", &max!(64)),
]);

// Chat text is stored as given; only the empty string is refused.
pub static MESSAGE: Validator<str> = Validator(&[("Message is empty.", &|s: &str| !s.is_empty())]);

// S3 caps object keys at 1024 bytes.
pub static IMAGE_KEY: Validator<str> = Validator(&[
    ("Image key shall not be empty.", &not_blank!()),
    ("Image key shall not be more than 1024 bytes.", &|s: &str| s.len() <= 1024),
    ("Image key shall not start with \"/\".", &|s: &str| !s.starts_with('/')),
]);

pub static FILE_EXTENSION: Validator<str> = Validator(&[(
    "File extension can only contain letters and numbers.",
    &is_match!(r"^[A-Za-z0-9]{1,10}$"),
)]);

#[test]
fn validator_test() {
    assert!(USERNAME.run("whoa").is_ok());
    assert!(USERNAME.run("Whoa Whoa").is_ok());
    assert!(USERNAME.run("").is_err());
    assert!(USERNAME.run("   ").is_err());
    assert!(USERNAME.run("a".repeat(65)).is_err());
    assert_eq!(USERNAME.run("").unwrap_err().0, "Username is required.");

    assert!(MESSAGE.run("hello, world").is_ok());
    assert!(MESSAGE.run("m".repeat(5000)).is_ok());
    assert!(MESSAGE.run("\n\t").is_ok());
    assert_eq!(MESSAGE.run("").unwrap_err().0, "Message is empty.");

    assert!(IMAGE_KEY.run("events/0b5d.png").is_ok());
    assert!(IMAGE_KEY.run("/events/0b5d.png").is_err());
    assert!(IMAGE_KEY.run("").is_err());

    assert!(FILE_EXTENSION.run("heic").is_ok());
    assert!(FILE_EXTENSION.run("tar.gz").is_err());
    assert!(FILE_EXTENSION.run("").is_err());
}
