//! Shared test harness modules for the Plateypus CLI.

use super::*;

mod helpers;
