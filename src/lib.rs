pub mod anomaly_injector;
pub mod config;
pub mod corpus;
pub mod corpus_text;
pub mod observation;
pub mod running_stats;
pub mod sample_generator;
pub mod shared_validator;
pub mod validator;
