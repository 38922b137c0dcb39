mod channel_tests;
mod config_tests;
mod pool_tests;
mod sink_tests;
