pub mod client;
pub mod live;

pub use client::GdaxClient;
pub use live::run_match_feed;
