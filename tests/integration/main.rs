//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a subsystem end to end
//! against the mock backend; nothing here touches real hardware or a live
//! socket.

mod gpio_tests;
mod mock_backend;
