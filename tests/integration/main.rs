//! End-to-end tests for the search engine over in-memory corpora.

mod cache_tests;
mod corpus_tests;
mod degradation_tests;
mod eval_tests;
mod ranking_tests;
mod request_validation_tests;
