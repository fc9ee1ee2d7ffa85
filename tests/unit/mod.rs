/// Unit tests for the query, validation, statistics and date building blocks
mod core_tests;
