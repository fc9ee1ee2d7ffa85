/// Integration tests running the analytics tools against fixture databases
mod fixtures;
mod service_tests;
mod tool_tests;
