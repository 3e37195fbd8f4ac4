mod bandwidth;

pub use self::bandwidth::Bandwidth;
