mod lock_ordering_tests;
mod once_tests;
