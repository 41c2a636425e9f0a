pub mod accuracy;
pub mod clock;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch_client;
pub mod http_client;
pub mod learner;
pub mod pipeline;
pub mod prediction;
pub mod rate_limit;
pub mod retry;
pub mod sportmonks;
pub mod store;
pub mod team_stats;
pub mod types;
pub mod weights;
