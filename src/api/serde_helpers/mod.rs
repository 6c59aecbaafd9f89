pub mod string_or_u64;
