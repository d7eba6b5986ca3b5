//! Write protection support
//!
//! This module provides types and functions for working with flash chip
//! write protection.

mod ranges;

pub use ranges::*;
