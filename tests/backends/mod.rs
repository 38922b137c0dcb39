mod taskline_core;
mod taskline_sync;
