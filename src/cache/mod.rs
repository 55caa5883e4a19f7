pub mod token_cache;
pub mod token_clock;
pub mod token_record;
